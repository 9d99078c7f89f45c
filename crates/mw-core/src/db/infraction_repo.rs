//! Infraction repository for database operations.

use super::{DbError, Pagination};
use crate::infraction::Infraction;
use crate::member::{CommunityId, MemberId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository trait for infraction persistence.
///
/// Infractions are append-only; the only mutation is clearing `active`.
#[async_trait]
pub trait InfractionRepository: Send + Sync {
    /// Stores a new infraction.
    async fn create(&self, infraction: &Infraction) -> Result<Infraction, DbError>;

    /// Lists a member's infractions, newest first.
    async fn list_for_member(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
        pagination: &Pagination,
    ) -> Result<Vec<Infraction>, DbError>;

    /// Counts all of a member's infractions, active or not.
    async fn count_for_member(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
    ) -> Result<u64, DbError>;

    /// Sums points of active infractions created after `since` (all, if `None`).
    async fn sum_active_points(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, DbError>;

    /// Clears every active infraction for a member. Returns how many changed.
    async fn deactivate_for_member(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
    ) -> Result<u64, DbError>;

    /// Clears active infractions created at or before `cutoff`. Returns how many changed.
    async fn deactivate_older_than(
        &self,
        community_id: CommunityId,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbError>;
}

#[cfg(feature = "database")]
pub use sqlite::SqliteInfractionRepository;

#[cfg(feature = "database")]
mod sqlite {
    use super::*;
    use crate::db::{format_timestamp, parse_timestamp};
    use crate::infraction::InfractionSource;
    use uuid::Uuid;

    /// SQLite implementation of InfractionRepository.
    pub struct SqliteInfractionRepository {
        pool: sqlx::SqlitePool,
    }

    impl SqliteInfractionRepository {
        pub fn new(pool: sqlx::SqlitePool) -> Self {
            Self { pool }
        }
    }

    #[derive(sqlx::FromRow)]
    struct InfractionRow {
        id: String,
        community_id: i64,
        member_id: i64,
        points: i64,
        source: String,
        rule_name: Option<String>,
        moderator_id: Option<i64>,
        reason: String,
        created_at: String,
        active: bool,
    }

    impl TryFrom<InfractionRow> for Infraction {
        type Error = DbError;

        fn try_from(row: InfractionRow) -> Result<Self, Self::Error> {
            let id = Uuid::parse_str(&row.id)
                .map_err(|e| DbError::Serialization(format!("Invalid infraction id: {}", e)))?;
            let source = InfractionSource::from_db_str(&row.source).ok_or_else(|| {
                DbError::Serialization(format!("Invalid infraction source: {}", row.source))
            })?;

            Ok(Infraction {
                id,
                community_id: row.community_id as u64,
                member_id: row.member_id as u64,
                points: row.points,
                source,
                rule_name: row.rule_name,
                moderator_id: row.moderator_id.map(|m| m as u64),
                reason: row.reason,
                created_at: parse_timestamp(&row.created_at)?,
                active: row.active,
            })
        }
    }

    const SELECT_COLUMNS: &str = "SELECT id, community_id, member_id, points, source, rule_name, moderator_id, reason, created_at, active FROM infractions";

    #[async_trait]
    impl InfractionRepository for SqliteInfractionRepository {
        async fn create(&self, infraction: &Infraction) -> Result<Infraction, DbError> {
            sqlx::query(
                r#"
                INSERT INTO infractions (id, community_id, member_id, points, source, rule_name, moderator_id, reason, created_at, active)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(infraction.id.to_string())
            .bind(infraction.community_id as i64)
            .bind(infraction.member_id as i64)
            .bind(infraction.points)
            .bind(infraction.source.as_db_str())
            .bind(&infraction.rule_name)
            .bind(infraction.moderator_id.map(|m| m as i64))
            .bind(&infraction.reason)
            .bind(format_timestamp(&infraction.created_at))
            .bind(infraction.active)
            .execute(&self.pool)
            .await?;

            Ok(infraction.clone())
        }

        async fn list_for_member(
            &self,
            community_id: CommunityId,
            member_id: MemberId,
            pagination: &Pagination,
        ) -> Result<Vec<Infraction>, DbError> {
            let query = format!(
                "{} WHERE community_id = ? AND member_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
                SELECT_COLUMNS
            );
            let rows: Vec<InfractionRow> = sqlx::query_as(&query)
                .bind(community_id as i64)
                .bind(member_id as i64)
                .bind(i64::from(pagination.limit()))
                .bind(i64::from(pagination.offset()))
                .fetch_all(&self.pool)
                .await?;

            rows.into_iter().map(Infraction::try_from).collect()
        }

        async fn count_for_member(
            &self,
            community_id: CommunityId,
            member_id: MemberId,
        ) -> Result<u64, DbError> {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM infractions WHERE community_id = ? AND member_id = ?",
            )
            .bind(community_id as i64)
            .bind(member_id as i64)
            .fetch_one(&self.pool)
            .await?;

            Ok(count as u64)
        }

        async fn sum_active_points(
            &self,
            community_id: CommunityId,
            member_id: MemberId,
            since: Option<DateTime<Utc>>,
        ) -> Result<i64, DbError> {
            let total: i64 = match since {
                Some(cutoff) => {
                    sqlx::query_scalar(
                        r#"SELECT COALESCE(SUM(points), 0) FROM infractions
                           WHERE community_id = ? AND member_id = ? AND active = 1 AND created_at > ?"#,
                    )
                    .bind(community_id as i64)
                    .bind(member_id as i64)
                    .bind(format_timestamp(&cutoff))
                    .fetch_one(&self.pool)
                    .await?
                }
                None => {
                    sqlx::query_scalar(
                        r#"SELECT COALESCE(SUM(points), 0) FROM infractions
                           WHERE community_id = ? AND member_id = ? AND active = 1"#,
                    )
                    .bind(community_id as i64)
                    .bind(member_id as i64)
                    .fetch_one(&self.pool)
                    .await?
                }
            };

            Ok(total)
        }

        async fn deactivate_for_member(
            &self,
            community_id: CommunityId,
            member_id: MemberId,
        ) -> Result<u64, DbError> {
            let result = sqlx::query(
                "UPDATE infractions SET active = 0 WHERE community_id = ? AND member_id = ? AND active = 1",
            )
            .bind(community_id as i64)
            .bind(member_id as i64)
            .execute(&self.pool)
            .await?;

            Ok(result.rows_affected())
        }

        async fn deactivate_older_than(
            &self,
            community_id: CommunityId,
            cutoff: DateTime<Utc>,
        ) -> Result<u64, DbError> {
            let result = sqlx::query(
                "UPDATE infractions SET active = 0 WHERE community_id = ? AND active = 1 AND created_at <= ?",
            )
            .bind(community_id as i64)
            .bind(format_timestamp(&cutoff))
            .execute(&self.pool)
            .await?;

            Ok(result.rows_affected())
        }
    }
}
