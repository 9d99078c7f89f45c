//! Persistence layer for Mod Warden.
//!
//! Repository traits are always available so services can be tested against the
//! in-memory mocks; the SQLite implementations require the `database` feature.

mod error;
pub mod mocks;
pub mod pagination;
mod pool;
mod schema;

pub mod config_repo;
pub mod infraction_repo;
pub mod rule_repo;

pub use error::DbError;
pub use pagination::{Pagination, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use pool::{create_pool, create_pool_with_options, PoolOptions};
pub use schema::run_migrations;

pub use config_repo::ModerationConfigRepository;
pub use infraction_repo::InfractionRepository;
pub use rule_repo::RuleRepository;

#[cfg(feature = "database")]
pub use config_repo::SqliteModerationConfigRepository;
#[cfg(feature = "database")]
pub use infraction_repo::SqliteInfractionRepository;
#[cfg(feature = "database")]
pub use rule_repo::SqliteRuleRepository;

use chrono::{DateTime, SecondsFormat, Utc};

/// Formats a timestamp for storage.
///
/// Fixed precision and a `Z` suffix keep stored values lexicographically ordered,
/// which the range queries depend on.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a timestamp written by [`format_timestamp`].
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Serialization(format!("Invalid timestamp '{}': {}", s, e)))
}
