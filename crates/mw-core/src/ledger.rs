//! Infraction ledger.
//!
//! The ledger is the only writer of infractions. Active points are always
//! computed on read from the stored rows and the community's decay settings,
//! so changing `decay_days` takes effect immediately without a migration.

use crate::db::{
    DbError, InfractionRepository, ModerationConfigRepository, Pagination, MAX_PAGE_SIZE,
};
use crate::infraction::{Infraction, NewInfraction};
use crate::member::{CommunityId, MemberId};
use crate::validation::ValidationError;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors returned by the ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Ledger storage error: {0}")]
    Storage(#[from] DbError),
}

/// One page of a member's infraction history.
#[derive(Debug, Clone, Serialize)]
pub struct InfractionPage {
    /// Infractions on this page, newest first.
    pub items: Vec<Infraction>,
    /// Total infractions for the member, active or not.
    pub total: u64,
    /// Page number (1-indexed).
    pub page: u32,
    /// Number of pages at the effective page size.
    pub page_count: u32,
}

/// Records, sums and clears infractions.
pub struct InfractionLedger {
    infractions: Arc<dyn InfractionRepository>,
    configs: Arc<dyn ModerationConfigRepository>,
}

impl InfractionLedger {
    pub fn new(
        infractions: Arc<dyn InfractionRepository>,
        configs: Arc<dyn ModerationConfigRepository>,
    ) -> Self {
        Self {
            infractions,
            configs,
        }
    }

    /// Records a new infraction. Points must be positive; nothing is stored otherwise.
    #[instrument(skip(self, new), fields(community_id = new.community_id, member_id = new.member_id, points = new.points))]
    pub async fn record(&self, new: NewInfraction) -> Result<Infraction, LedgerError> {
        if new.points <= 0 {
            return Err(ValidationError::NonPositivePoints(new.points).into());
        }

        let infraction = self.infractions.create(&new.into_infraction()).await?;
        info!(
            infraction_id = %infraction.id,
            source = %infraction.source,
            "Recorded infraction"
        );
        Ok(infraction)
    }

    /// Sum of points over active, non-decayed infractions.
    pub async fn active_points(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
    ) -> Result<i64, LedgerError> {
        let config = self.configs.get_or_create(community_id).await?;
        let cutoff = config.decay_cutoff(Utc::now());
        let points = self
            .infractions
            .sum_active_points(community_id, member_id, cutoff)
            .await?;
        debug!(community_id, member_id, points, "Computed active points");
        Ok(points)
    }

    /// Lists a member's infractions newest first.
    ///
    /// `page` is clamped to at least 1 and `page_size` to `1..=MAX_PAGE_SIZE`.
    pub async fn list_infractions(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
        page: u32,
        page_size: u32,
    ) -> Result<InfractionPage, LedgerError> {
        let pagination = Pagination::new(page, page_size.min(MAX_PAGE_SIZE));
        let total = self
            .infractions
            .count_for_member(community_id, member_id)
            .await?;
        let items = self
            .infractions
            .list_for_member(community_id, member_id, &pagination)
            .await?;

        Ok(InfractionPage {
            items,
            total,
            page: pagination.page,
            page_count: pagination.total_pages(total),
        })
    }

    /// Deactivates every active infraction of a member. Returns how many changed,
    /// so a second call returns 0.
    #[instrument(skip(self))]
    pub async fn clear(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
    ) -> Result<u64, LedgerError> {
        let cleared = self
            .infractions
            .deactivate_for_member(community_id, member_id)
            .await?;
        info!(cleared, "Cleared infractions");
        Ok(cleared)
    }

    /// Deactivates infractions that have fallen out of the decay window.
    ///
    /// Only tidies storage: `active_points` already ignores decayed rows.
    /// Does nothing when decay is disabled. The caller owns scheduling;
    /// `mod-warden sweep` runs one pass.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, community_id: CommunityId) -> Result<u64, LedgerError> {
        let config = self.configs.get_or_create(community_id).await?;
        let Some(cutoff) = config.decay_cutoff(Utc::now()) else {
            return Ok(0);
        };

        let swept = self
            .infractions
            .deactivate_older_than(community_id, cutoff)
            .await?;
        if swept > 0 {
            info!(swept, "Deactivated expired infractions");
        }
        Ok(swept)
    }
}
