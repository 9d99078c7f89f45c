//! Mock implementations of repository traits for testing.
//!
//! These mocks use in-memory storage and do not require a database connection.
//! They back the service tests of the ledger, escalation and automod pipeline.

mod config_repo;
mod infraction_repo;
mod rule_repo;

pub use config_repo::MockModerationConfigRepository;
pub use infraction_repo::MockInfractionRepository;
pub use rule_repo::MockRuleRepository;
