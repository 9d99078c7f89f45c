//! Storage errors.

use thiserror::Error;

/// Errors returned by the repositories.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint hit, e.g. a second rule with the same name in a community.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A stored row or JSON column could not be decoded.
    #[error("Corrupt stored value: {0}")]
    Serialization(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Invalid database configuration: {0}")]
    Configuration(String),
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::Constraint(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::Configuration(msg) => DbError::Configuration(msg.to_string()),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::Serialization(format!("column {}: {}", index, source))
            }
            other => DbError::Query(other.to_string()),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}
