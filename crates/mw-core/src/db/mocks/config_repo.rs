//! Mock implementation of ModerationConfigRepository for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::ModerationConfig;
use crate::db::{DbError, ModerationConfigRepository};
use crate::member::CommunityId;

/// Mock implementation of ModerationConfigRepository using in-memory storage.
pub struct MockModerationConfigRepository {
    configs: Arc<RwLock<HashMap<CommunityId, ModerationConfig>>>,
    fail_reads: AtomicBool,
}

impl Default for MockModerationConfigRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModerationConfigRepository {
    /// Creates a new mock repository.
    pub fn new() -> Self {
        Self {
            configs: Arc::new(RwLock::new(HashMap::new())),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Creates a mock repository holding a single community's config.
    pub fn with_config(config: ModerationConfig) -> Self {
        let mut map = HashMap::new();
        map.insert(config.community_id, config);
        Self {
            configs: Arc::new(RwLock::new(map)),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent read fail with a query error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ModerationConfigRepository for MockModerationConfigRepository {
    async fn get(&self, community_id: CommunityId) -> Result<Option<ModerationConfig>, DbError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DbError::Query("simulated read failure".to_string()));
        }
        let configs = self.configs.read().await;
        Ok(configs.get(&community_id).cloned())
    }

    async fn upsert(&self, config: &ModerationConfig) -> Result<ModerationConfig, DbError> {
        let mut stored = config.clone();
        stored.updated_at = Utc::now();
        let mut configs = self.configs.write().await;
        configs.insert(stored.community_id, stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_stores_defaults() {
        let repo = MockModerationConfigRepository::new();
        assert!(repo.get(9).await.unwrap().is_none());

        let created = repo.get_or_create(9).await.unwrap();
        assert!(created.automod_enabled);
        assert!(repo.get(9).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let repo = MockModerationConfigRepository::with_config(ModerationConfig::new(3));
        let mut config = repo.get_or_create(3).await.unwrap();
        config.automod_enabled = false;
        repo.upsert(&config).await.unwrap();

        assert!(!repo.get(3).await.unwrap().unwrap().automod_enabled);
    }
}
