//! Metrics collection for Mod Warden.
//!
//! Counters are emitted through the `metrics` facade so any recorder the
//! host installs picks them up. The collector also keeps local totals so a
//! snapshot is available without a recorder.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time totals kept by the collector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub events_evaluated: u64,
    pub rule_matches: u64,
    pub infractions_recorded: u64,
    pub sanctions_executed: u64,
    pub sanctions_failed: u64,
    pub escalations_triggered: u64,
    pub notification_failures: u64,
    pub log_failures: u64,
}

/// Metrics collector for the moderation pipeline.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    events_evaluated: AtomicU64,
    rule_matches: AtomicU64,
    infractions_recorded: AtomicU64,
    sanctions_executed: AtomicU64,
    sanctions_failed: AtomicU64,
    escalations_triggered: AtomicU64,
    notification_failures: AtomicU64,
    log_failures: AtomicU64,
}

impl MetricsCollector {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::register_metrics();
        Self::default()
    }

    /// Registers metric descriptions.
    fn register_metrics() {
        describe_counter!(
            "mw_events_evaluated_total",
            "Inbound events evaluated by automod"
        );
        describe_counter!("mw_rule_matches_total", "Events that matched a rule");
        describe_counter!(
            "mw_infractions_recorded_total",
            "Infractions written to the ledger"
        );
        describe_counter!(
            "mw_sanctions_total",
            "Sanctions attempted, by action and status"
        );
        describe_counter!(
            "mw_escalations_triggered_total",
            "Escalation tiers fired"
        );
        describe_counter!(
            "mw_notification_failures_total",
            "Member notifications that could not be delivered"
        );
        describe_counter!(
            "mw_log_failures_total",
            "Audit-log entries that could not be delivered"
        );
        describe_histogram!(
            "mw_event_duration_seconds",
            "Time spent handling one inbound event"
        );
    }

    pub fn record_event_evaluated(&self, kind: &str) {
        self.events_evaluated.fetch_add(1, Ordering::Relaxed);
        counter!("mw_events_evaluated_total", "kind" => kind.to_string()).increment(1);
    }

    pub fn record_rule_match(&self, rule: &str) {
        self.rule_matches.fetch_add(1, Ordering::Relaxed);
        counter!("mw_rule_matches_total", "rule" => rule.to_string()).increment(1);
    }

    /// Records an infraction, labelled by source (`automod` or `manual`).
    pub fn record_infraction(&self, source: &str) {
        self.infractions_recorded.fetch_add(1, Ordering::Relaxed);
        counter!("mw_infractions_recorded_total", "source" => source.to_string()).increment(1);
    }

    /// Records a sanction attempt.
    pub fn record_sanction(&self, action: &str, success: bool) {
        let status = if success {
            self.sanctions_executed.fetch_add(1, Ordering::Relaxed);
            "success"
        } else {
            self.sanctions_failed.fetch_add(1, Ordering::Relaxed);
            "failure"
        };
        counter!("mw_sanctions_total", "action" => action.to_string(), "status" => status)
            .increment(1);
    }

    pub fn record_escalation(&self, tier: &str) {
        self.escalations_triggered.fetch_add(1, Ordering::Relaxed);
        counter!("mw_escalations_triggered_total", "tier" => tier.to_string()).increment(1);
    }

    pub fn record_notification_failure(&self) {
        self.notification_failures.fetch_add(1, Ordering::Relaxed);
        counter!("mw_notification_failures_total").increment(1);
    }

    pub fn record_log_failure(&self) {
        self.log_failures.fetch_add(1, Ordering::Relaxed);
        counter!("mw_log_failures_total").increment(1);
    }

    pub fn record_event_duration(&self, duration_secs: f64) {
        histogram!("mw_event_duration_seconds").record(duration_secs);
    }

    /// Current local totals.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_evaluated: self.events_evaluated.load(Ordering::Relaxed),
            rule_matches: self.rule_matches.load(Ordering::Relaxed),
            infractions_recorded: self.infractions_recorded.load(Ordering::Relaxed),
            sanctions_executed: self.sanctions_executed.load(Ordering::Relaxed),
            sanctions_failed: self.sanctions_failed.load(Ordering::Relaxed),
            escalations_triggered: self.escalations_triggered.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            log_failures: self.log_failures.load(Ordering::Relaxed),
        }
    }
}
