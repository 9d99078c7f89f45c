//! Mock implementation of InfractionRepository for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::{DbError, InfractionRepository, Pagination};
use crate::infraction::Infraction;
use crate::member::{CommunityId, MemberId};

/// Mock implementation of InfractionRepository using in-memory storage.
pub struct MockInfractionRepository {
    infractions: Arc<RwLock<Vec<Infraction>>>,
    fail_writes: AtomicBool,
}

impl Default for MockInfractionRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInfractionRepository {
    /// Creates a new mock repository.
    pub fn new() -> Self {
        Self {
            infractions: Arc::new(RwLock::new(Vec::new())),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Creates a mock repository pre-populated with infractions.
    pub fn with_infractions(infractions: Vec<Infraction>) -> Self {
        Self {
            infractions: Arc::new(RwLock::new(infractions)),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent write fail with a query error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Gets a snapshot of all infractions in the mock.
    pub async fn snapshot(&self) -> Vec<Infraction> {
        self.infractions.read().await.clone()
    }

    fn check_writable(&self) -> Result<(), DbError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::Query("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InfractionRepository for MockInfractionRepository {
    async fn create(&self, infraction: &Infraction) -> Result<Infraction, DbError> {
        self.check_writable()?;
        let mut infractions = self.infractions.write().await;

        if infractions.iter().any(|i| i.id == infraction.id) {
            return Err(DbError::Constraint(format!(
                "Infraction with id '{}' already exists",
                infraction.id
            )));
        }

        infractions.push(infraction.clone());
        Ok(infraction.clone())
    }

    async fn list_for_member(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
        pagination: &Pagination,
    ) -> Result<Vec<Infraction>, DbError> {
        let infractions = self.infractions.read().await;
        // Reverse first so equal timestamps keep newest-inserted first after the stable sort.
        let mut result: Vec<Infraction> = infractions
            .iter()
            .rev()
            .filter(|i| i.community_id == community_id && i.member_id == member_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(result
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit() as usize)
            .collect())
    }

    async fn count_for_member(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
    ) -> Result<u64, DbError> {
        let infractions = self.infractions.read().await;
        Ok(infractions
            .iter()
            .filter(|i| i.community_id == community_id && i.member_id == member_id)
            .count() as u64)
    }

    async fn sum_active_points(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, DbError> {
        let infractions = self.infractions.read().await;
        Ok(infractions
            .iter()
            .filter(|i| i.community_id == community_id && i.member_id == member_id)
            .filter(|i| i.counts_toward_points(since))
            .map(|i| i.points)
            .sum())
    }

    async fn deactivate_for_member(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
    ) -> Result<u64, DbError> {
        self.check_writable()?;
        let mut infractions = self.infractions.write().await;
        let mut changed = 0;
        for infraction in infractions
            .iter_mut()
            .filter(|i| i.community_id == community_id && i.member_id == member_id && i.active)
        {
            infraction.active = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn deactivate_older_than(
        &self,
        community_id: CommunityId,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        self.check_writable()?;
        let mut infractions = self.infractions.write().await;
        let mut changed = 0;
        for infraction in infractions
            .iter_mut()
            .filter(|i| i.community_id == community_id && i.active && i.created_at <= cutoff)
        {
            infraction.active = false;
            changed += 1;
        }
        Ok(changed)
    }
}
