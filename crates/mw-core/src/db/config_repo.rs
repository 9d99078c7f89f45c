//! Moderation config repository.

use super::DbError;
use crate::config::ModerationConfig;
use crate::member::CommunityId;
use async_trait::async_trait;
use tracing::debug;

/// Repository trait for per-community moderation settings.
#[async_trait]
pub trait ModerationConfigRepository: Send + Sync {
    /// Gets the stored settings for a community.
    async fn get(&self, community_id: CommunityId) -> Result<Option<ModerationConfig>, DbError>;

    /// Inserts or replaces the settings for a community.
    async fn upsert(&self, config: &ModerationConfig) -> Result<ModerationConfig, DbError>;

    /// Gets the settings, creating and storing defaults on first access.
    async fn get_or_create(&self, community_id: CommunityId) -> Result<ModerationConfig, DbError> {
        if let Some(config) = self.get(community_id).await? {
            return Ok(config);
        }
        debug!(community_id, "Creating default moderation config");
        self.upsert(&ModerationConfig::new(community_id)).await
    }
}

#[cfg(feature = "database")]
pub use sqlite::SqliteModerationConfigRepository;

#[cfg(feature = "database")]
mod sqlite {
    use super::*;
    use crate::db::format_timestamp;

    /// SQLite implementation; the config is stored as one JSON document per community.
    pub struct SqliteModerationConfigRepository {
        pool: sqlx::SqlitePool,
    }

    impl SqliteModerationConfigRepository {
        pub fn new(pool: sqlx::SqlitePool) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl ModerationConfigRepository for SqliteModerationConfigRepository {
        async fn get(
            &self,
            community_id: CommunityId,
        ) -> Result<Option<ModerationConfig>, DbError> {
            let settings: Option<String> = sqlx::query_scalar(
                "SELECT settings FROM moderation_configs WHERE community_id = ?",
            )
            .bind(community_id as i64)
            .fetch_optional(&self.pool)
            .await?;

            settings
                .map(|json| serde_json::from_str(&json).map_err(DbError::from))
                .transpose()
        }

        async fn upsert(&self, config: &ModerationConfig) -> Result<ModerationConfig, DbError> {
            let mut stored = config.clone();
            stored.updated_at = chrono::Utc::now();

            sqlx::query(
                r#"
                INSERT INTO moderation_configs (community_id, settings, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(community_id) DO UPDATE SET settings = excluded.settings, updated_at = excluded.updated_at
                "#,
            )
            .bind(stored.community_id as i64)
            .bind(serde_json::to_string(&stored)?)
            .bind(format_timestamp(&stored.updated_at))
            .execute(&self.pool)
            .await?;

            Ok(stored)
        }
    }
}
