//! Mock implementation of RuleRepository for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{DbError, RuleRepository};
use crate::member::CommunityId;
use crate::rule::{Rule, RuleUpdate};

/// Mock implementation of RuleRepository using in-memory storage.
///
/// Rules are kept in insertion order, matching the SQLite rowid ordering.
pub struct MockRuleRepository {
    rules: Arc<RwLock<Vec<Rule>>>,
}

impl Default for MockRuleRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRuleRepository {
    /// Creates a new mock repository.
    pub fn new() -> Self {
        Self {
            rules: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a mock repository pre-populated with rules.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules: Arc::new(RwLock::new(rules)),
        }
    }

    /// Gets a snapshot of all rules in the mock.
    pub async fn snapshot(&self) -> Vec<Rule> {
        self.rules.read().await.clone()
    }
}

#[async_trait]
impl RuleRepository for MockRuleRepository {
    async fn create(&self, rule: &Rule) -> Result<Rule, DbError> {
        let mut rules = self.rules.write().await;

        if rules.iter().any(|r| r.id == rule.id) {
            return Err(DbError::Constraint(format!(
                "Rule with id '{}' already exists",
                rule.id
            )));
        }
        if rules
            .iter()
            .any(|r| r.community_id == rule.community_id && r.name == rule.name)
        {
            return Err(DbError::Constraint(format!(
                "Rule with name '{}' already exists",
                rule.name
            )));
        }

        rules.push(rule.clone());
        Ok(rule.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Rule>, DbError> {
        let rules = self.rules.read().await;
        Ok(rules.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self, community_id: CommunityId) -> Result<Vec<Rule>, DbError> {
        let rules = self.rules.read().await;
        Ok(rules
            .iter()
            .filter(|r| r.community_id == community_id)
            .cloned()
            .collect())
    }

    async fn list_enabled(&self, community_id: CommunityId) -> Result<Vec<Rule>, DbError> {
        let rules = self.rules.read().await;
        Ok(rules
            .iter()
            .filter(|r| r.community_id == community_id && r.enabled)
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, update: &RuleUpdate) -> Result<Rule, DbError> {
        let mut rules = self.rules.write().await;

        let rule = rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| DbError::NotFound {
                entity: "Rule",
                id: id.to_string(),
            })?;

        update.apply(rule);
        Ok(rule.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|r| r.id != id);
        Ok(rules.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{PatternDef, RuleTarget};

    fn rule(community_id: CommunityId, name: &str) -> Rule {
        Rule::new(
            community_id,
            name,
            vec![RuleTarget::MessageText],
            vec![PatternDef::new("spam")],
        )
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let repo = MockRuleRepository::new();
        repo.create(&rule(1, "zeta")).await.unwrap();
        repo.create(&rule(1, "alpha")).await.unwrap();
        repo.create(&rule(2, "other")).await.unwrap();

        let names: Vec<String> = repo.list(1).await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_list_enabled_skips_disabled() {
        let repo = MockRuleRepository::new();
        repo.create(&rule(1, "on")).await.unwrap();
        repo.create(&rule(1, "off").disabled()).await.unwrap();

        let enabled = repo.list_enabled(1).await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "on");
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let repo = MockRuleRepository::new();
        repo.create(&rule(1, "dup")).await.unwrap();
        let result = repo.create(&rule(1, "dup")).await;
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = MockRuleRepository::new();
        let created = repo.create(&rule(1, "r")).await.unwrap();

        let update = RuleUpdate {
            points: Some(4),
            enabled: Some(false),
            ..Default::default()
        };
        let updated = repo.update(created.id, &update).await.unwrap();
        assert_eq!(updated.points, 4);
        assert!(!updated.enabled);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert!(matches!(
            repo.update(created.id, &update).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
