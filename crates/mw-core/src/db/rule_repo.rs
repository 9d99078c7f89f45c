//! Rule repository for database operations.

use super::DbError;
use crate::member::CommunityId;
use crate::rule::{Rule, RuleUpdate};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository trait for rule persistence.
///
/// `list` and `list_enabled` return rules in configuration (insertion) order;
/// the rule engine relies on that order to break priority ties.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Creates a new rule.
    async fn create(&self, rule: &Rule) -> Result<Rule, DbError>;

    /// Gets a rule by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Rule>, DbError>;

    /// Lists all rules of a community in configuration order.
    async fn list(&self, community_id: CommunityId) -> Result<Vec<Rule>, DbError>;

    /// Lists enabled rules of a community in configuration order.
    async fn list_enabled(&self, community_id: CommunityId) -> Result<Vec<Rule>, DbError>;

    /// Updates a rule.
    async fn update(&self, id: Uuid, update: &RuleUpdate) -> Result<Rule, DbError>;

    /// Deletes a rule.
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;
}

#[cfg(feature = "database")]
pub use sqlite::SqliteRuleRepository;

#[cfg(feature = "database")]
mod sqlite {
    use super::*;
    use crate::db::{format_timestamp, parse_timestamp};

    /// SQLite implementation of RuleRepository. Structured fields are stored as JSON.
    pub struct SqliteRuleRepository {
        pool: sqlx::SqlitePool,
    }

    impl SqliteRuleRepository {
        pub fn new(pool: sqlx::SqlitePool) -> Self {
            Self { pool }
        }
    }

    #[derive(sqlx::FromRow)]
    struct RuleRow {
        id: String,
        community_id: i64,
        name: String,
        enabled: bool,
        priority: i32,
        targets: String,
        patterns: String,
        match_mode: String,
        points: i64,
        actions: String,
        notification: Option<String>,
        created_at: String,
        updated_at: String,
    }

    impl TryFrom<RuleRow> for Rule {
        type Error = DbError;

        fn try_from(row: RuleRow) -> Result<Self, Self::Error> {
            let id = Uuid::parse_str(&row.id)
                .map_err(|e| DbError::Serialization(format!("Invalid rule id: {}", e)))?;
            let notification = match row.notification {
                Some(json) => Some(serde_json::from_str(&json)?),
                None => None,
            };

            Ok(Rule {
                id,
                community_id: row.community_id as u64,
                name: row.name,
                enabled: row.enabled,
                priority: row.priority,
                targets: serde_json::from_str(&row.targets)?,
                patterns: serde_json::from_str(&row.patterns)?,
                match_mode: serde_json::from_value(serde_json::Value::String(row.match_mode))?,
                points: row.points,
                actions: serde_json::from_str(&row.actions)?,
                notification,
                created_at: parse_timestamp(&row.created_at)?,
                updated_at: parse_timestamp(&row.updated_at)?,
            })
        }
    }

    fn match_mode_str(rule: &Rule) -> Result<String, DbError> {
        match serde_json::to_value(rule.match_mode)? {
            serde_json::Value::String(s) => Ok(s),
            other => Err(DbError::Serialization(format!(
                "Unexpected match mode encoding: {}",
                other
            ))),
        }
    }

    const SELECT_COLUMNS: &str = "SELECT id, community_id, name, enabled, priority, targets, patterns, match_mode, points, actions, notification, created_at, updated_at FROM rules";

    #[async_trait]
    impl RuleRepository for SqliteRuleRepository {
        async fn create(&self, rule: &Rule) -> Result<Rule, DbError> {
            let notification = rule
                .notification
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            sqlx::query(
                r#"
                INSERT INTO rules (id, community_id, name, enabled, priority, targets, patterns, match_mode, points, actions, notification, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(rule.id.to_string())
            .bind(rule.community_id as i64)
            .bind(&rule.name)
            .bind(rule.enabled)
            .bind(rule.priority)
            .bind(serde_json::to_string(&rule.targets)?)
            .bind(serde_json::to_string(&rule.patterns)?)
            .bind(match_mode_str(rule)?)
            .bind(rule.points)
            .bind(serde_json::to_string(&rule.actions)?)
            .bind(notification)
            .bind(format_timestamp(&rule.created_at))
            .bind(format_timestamp(&rule.updated_at))
            .execute(&self.pool)
            .await?;

            Ok(rule.clone())
        }

        async fn get(&self, id: Uuid) -> Result<Option<Rule>, DbError> {
            let query = format!("{} WHERE id = ?", SELECT_COLUMNS);
            let row: Option<RuleRow> = sqlx::query_as(&query)
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

            row.map(Rule::try_from).transpose()
        }

        async fn list(&self, community_id: CommunityId) -> Result<Vec<Rule>, DbError> {
            let query = format!("{} WHERE community_id = ? ORDER BY rowid ASC", SELECT_COLUMNS);
            let rows: Vec<RuleRow> = sqlx::query_as(&query)
                .bind(community_id as i64)
                .fetch_all(&self.pool)
                .await?;

            rows.into_iter().map(Rule::try_from).collect()
        }

        async fn list_enabled(&self, community_id: CommunityId) -> Result<Vec<Rule>, DbError> {
            let query = format!(
                "{} WHERE community_id = ? AND enabled = 1 ORDER BY rowid ASC",
                SELECT_COLUMNS
            );
            let rows: Vec<RuleRow> = sqlx::query_as(&query)
                .bind(community_id as i64)
                .fetch_all(&self.pool)
                .await?;

            rows.into_iter().map(Rule::try_from).collect()
        }

        async fn update(&self, id: Uuid, update: &RuleUpdate) -> Result<Rule, DbError> {
            let mut rule = self.get(id).await?.ok_or_else(|| DbError::NotFound {
                entity: "Rule",
                id: id.to_string(),
            })?;
            update.apply(&mut rule);

            let notification = rule
                .notification
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            sqlx::query(
                r#"
                UPDATE rules SET name = ?, enabled = ?, priority = ?, targets = ?, patterns = ?,
                    match_mode = ?, points = ?, actions = ?, notification = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&rule.name)
            .bind(rule.enabled)
            .bind(rule.priority)
            .bind(serde_json::to_string(&rule.targets)?)
            .bind(serde_json::to_string(&rule.patterns)?)
            .bind(match_mode_str(&rule)?)
            .bind(rule.points)
            .bind(serde_json::to_string(&rule.actions)?)
            .bind(notification)
            .bind(format_timestamp(&rule.updated_at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

            Ok(rule)
        }

        async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
            let result = sqlx::query("DELETE FROM rules WHERE id = ?")
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;

            Ok(result.rows_affected() > 0)
        }
    }
}
