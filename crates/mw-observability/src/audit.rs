//! In-process moderation audit trail.
//!
//! Every sanction the executor attempts lands here, whether it succeeded,
//! failed on the platform, or was refused by the hierarchy check. The trail
//! is a bounded ring buffer; it complements but does not replace the
//! community's mod-log channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Outcome of an audited sanction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure(String),
    Denied(String),
}

impl AuditOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuditOutcome::Success)
    }
}

/// One audited sanction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationAuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Action name (`ban`, `timeout`, `warn`, ...).
    pub action: String,
    pub community_id: u64,
    pub target_id: u64,
    /// Invoking staff member; `None` for automod and escalations.
    pub moderator_id: Option<u64>,
    pub reason: String,
    pub outcome: AuditOutcome,
    pub details: serde_json::Value,
}

impl ModerationAuditEntry {
    pub fn new(
        action: &str,
        community_id: u64,
        target_id: u64,
        moderator_id: Option<u64>,
        reason: &str,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action: action.to_string(),
            community_id,
            target_id,
            moderator_id,
            reason: reason.to_string(),
            outcome,
            details: serde_json::json!({}),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Bounded audit trail shared between services.
#[derive(Clone)]
pub struct ModerationAuditLog {
    entries: Arc<RwLock<VecDeque<ModerationAuditEntry>>>,
    max_entries: usize,
    log_to_tracing: bool,
}

impl ModerationAuditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_entries))),
            max_entries,
            log_to_tracing: true,
        }
    }

    /// Creates a trail that does not echo entries to tracing.
    pub fn without_tracing(max_entries: usize) -> Self {
        Self {
            log_to_tracing: false,
            ..Self::new(max_entries)
        }
    }

    /// Appends an entry, evicting the oldest when full.
    pub async fn log(&self, entry: ModerationAuditEntry) {
        if self.log_to_tracing {
            info!(
                action = %entry.action,
                community_id = entry.community_id,
                target_id = entry.target_id,
                moderator_id = ?entry.moderator_id,
                outcome = ?entry.outcome,
                "Audit: {}",
                entry.reason
            );
        }

        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// All entries, oldest first.
    pub async fn entries(&self) -> Vec<ModerationAuditEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// Entries targeting one member of one community.
    pub async fn entries_for_member(
        &self,
        community_id: u64,
        member_id: u64,
    ) -> Vec<ModerationAuditEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.community_id == community_id && e.target_id == member_id)
            .cloned()
            .collect()
    }

    /// Entries issued by one staff member.
    pub async fn entries_by_moderator(&self, moderator_id: u64) -> Vec<ModerationAuditEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.moderator_id == Some(moderator_id))
            .cloned()
            .collect()
    }

    /// Exports entries as JSON.
    pub async fn export_json(&self) -> String {
        let entries = self.entries().await;
        serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for ModerationAuditLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_and_filter() {
        let audit = ModerationAuditLog::without_tracing(100);
        audit
            .log(ModerationAuditEntry::new(
                "ban",
                1,
                42,
                Some(7),
                "raiding",
                AuditOutcome::Success,
            ))
            .await;
        audit
            .log(ModerationAuditEntry::new(
                "timeout",
                1,
                43,
                None,
                "Escalation tier T1",
                AuditOutcome::Failure("missing permission".into()),
            ))
            .await;

        assert_eq!(audit.len().await, 2);
        assert_eq!(audit.entries_for_member(1, 42).await.len(), 1);
        assert_eq!(audit.entries_for_member(2, 42).await.len(), 0);
        assert_eq!(audit.entries_by_moderator(7).await[0].action, "ban");
    }

    #[tokio::test]
    async fn test_max_entries() {
        let audit = ModerationAuditLog::without_tracing(3);
        for target in 0..5 {
            audit
                .log(ModerationAuditEntry::new(
                    "warn",
                    1,
                    target,
                    None,
                    "r",
                    AuditOutcome::Success,
                ))
                .await;
        }

        let entries = audit.entries().await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].target_id, 2);
    }

    #[tokio::test]
    async fn test_export_json() {
        let audit = ModerationAuditLog::without_tracing(10);
        audit
            .log(
                ModerationAuditEntry::new(
                    "kick",
                    1,
                    2,
                    Some(3),
                    "r",
                    AuditOutcome::Denied("hierarchy".into()),
                )
                .with_details(serde_json::json!({"points": 4})),
            )
            .await;

        let json = audit.export_json().await;
        assert!(json.contains("\"denied\""));
        assert!(json.contains("\"points\": 4"));
    }
}
