//! Validation errors raised before configuration is persisted.

use thiserror::Error;

/// A rule, tier or config that must be rejected before it is saved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Unsupported pattern flag '{flag}' in '{pattern}'")]
    InvalidFlag { pattern: String, flag: char },

    #[error("Invalid rule '{rule}': {message}")]
    InvalidRule { rule: String, message: String },

    #[error("Invalid escalation tier '{tier}': {message}")]
    InvalidTier { tier: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Points must be positive, got {0}")]
    NonPositivePoints(i64),
}
