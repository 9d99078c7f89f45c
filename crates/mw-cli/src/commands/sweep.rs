//! Deactivates decayed infractions stored in a SQLite database.
//!
//! Active-point totals already ignore decayed rows, so this only keeps the
//! stored history tidy. Hosts run it on whatever schedule suits them.

use anyhow::{bail, Context, Result};
use mw_core::db::{
    create_pool, run_migrations, ModerationConfigRepository, SqliteInfractionRepository,
    SqliteModerationConfigRepository,
};
use mw_core::{CommunityId, InfractionLedger};
use serde_json::json;
use std::sync::Arc;

/// What a sweep changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub community_id: CommunityId,
    /// Whether the community has decay enabled at all.
    pub decay_enabled: bool,
    pub swept: u64,
}

impl SweepSummary {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "community_id": self.community_id,
            "decay_enabled": self.decay_enabled,
            "swept": self.swept,
        })
    }
}

/// Sweeps one community. The community must already have stored settings.
pub async fn sweep_community(
    database_url: &str,
    community_id: CommunityId,
) -> Result<SweepSummary> {
    let pool = create_pool(database_url)
        .await
        .with_context(|| format!("Failed to open database {}", database_url))?;
    run_migrations(&pool).await.context("Failed to run migrations")?;

    let configs = Arc::new(SqliteModerationConfigRepository::new(pool.clone()));
    let Some(config) = configs.get(community_id).await? else {
        bail!(
            "Community {} has no stored settings; import a rule file first",
            community_id
        );
    };

    let ledger = InfractionLedger::new(Arc::new(SqliteInfractionRepository::new(pool)), configs);
    let swept = ledger
        .sweep_expired(community_id)
        .await
        .with_context(|| format!("Failed to sweep community {}", community_id))?;

    Ok(SweepSummary {
        community_id,
        decay_enabled: config.decay_enabled,
        swept,
    })
}
