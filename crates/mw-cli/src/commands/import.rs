//! Loads a rule file into a SQLite database.

use anyhow::{Context, Result};
use mw_core::db::{
    create_pool, run_migrations, ModerationConfigRepository, RuleRepository,
    SqliteModerationConfigRepository, SqliteRuleRepository,
};
use mw_policy::RuleFile;
use serde_json::json;
use std::collections::HashSet;
use tracing::info;

/// What an import changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub replaced: usize,
    pub removed: usize,
}

impl ImportSummary {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "created": self.created,
            "replaced": self.replaced,
            "removed": self.removed,
        })
    }
}

/// Writes the file's settings and rules for its community.
///
/// Stored rules with the same name as a file rule are replaced. With `prune`,
/// stored rules the file does not mention are deleted.
pub async fn import_rule_file(
    file: &RuleFile,
    database_url: &str,
    prune: bool,
) -> Result<ImportSummary> {
    let pool = create_pool(database_url)
        .await
        .with_context(|| format!("Failed to open database {}", database_url))?;
    run_migrations(&pool).await.context("Failed to run migrations")?;

    let configs = SqliteModerationConfigRepository::new(pool.clone());
    let rules = SqliteRuleRepository::new(pool);

    configs
        .upsert(&file.to_moderation_config())
        .await
        .context("Failed to store moderation config")?;

    let existing = rules.list(file.community_id).await?;
    let incoming: HashSet<&str> = file.rules.iter().map(|r| r.name.as_str()).collect();
    let mut summary = ImportSummary::default();

    for stored in &existing {
        if incoming.contains(stored.name.as_str()) {
            rules.delete(stored.id).await?;
            summary.replaced += 1;
        } else if prune {
            rules.delete(stored.id).await?;
            summary.removed += 1;
        }
    }

    for rule in file.to_rules() {
        rules
            .create(&rule)
            .await
            .with_context(|| format!("Failed to store rule '{}'", rule.name))?;
    }
    summary.created = file.rules.len() - summary.replaced;

    info!(
        community_id = file.community_id,
        created = summary.created,
        replaced = summary.replaced,
        removed = summary.removed,
        "Imported rule file"
    );
    Ok(summary)
}
