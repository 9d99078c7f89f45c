//! # mw-observability
//!
//! Logging, metrics, and audit infrastructure for Mod Warden.
//!
//! This crate provides structured logging with tracing, moderation metrics,
//! and an in-process trail of every sanction the executor attempted.

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{AuditOutcome, ModerationAuditEntry, ModerationAuditLog};
pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::{MetricsCollector, MetricsSnapshot};
