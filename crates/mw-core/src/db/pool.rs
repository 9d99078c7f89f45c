//! Database connection pool management.

use super::DbError;
use std::time::Duration;

/// Options for creating a database connection pool.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections to maintain.
    pub min_connections: u32,
    /// Maximum time to wait for a connection.
    pub acquire_timeout: Duration,
    /// Idle timeout for connections.
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        let max_connections = std::env::var("MW_DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let acquire_timeout_secs = std::env::var("MW_DATABASE_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Self {
            max_connections,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }
}

/// Creates a SQLite connection pool from a `sqlite:` URL.
#[cfg(feature = "database")]
pub async fn create_pool(database_url: &str) -> Result<sqlx::SqlitePool, DbError> {
    create_pool_with_options(database_url, PoolOptions::default()).await
}

/// Creates a SQLite connection pool with custom options.
#[cfg(feature = "database")]
pub async fn create_pool_with_options(
    database_url: &str,
    options: PoolOptions,
) -> Result<sqlx::SqlitePool, DbError> {
    use tracing::info;

    if !database_url.starts_with("sqlite:") {
        return Err(DbError::Configuration(format!(
            "Unsupported database URL scheme. Expected sqlite:, got: {}",
            database_url.split(':').next().unwrap_or("unknown")
        )));
    }

    info!("Creating SQLite connection pool");
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .min_connections(options.min_connections)
        .acquire_timeout(options.acquire_timeout)
        .idle_timeout(options.idle_timeout)
        .connect(database_url)
        .await?;
    Ok(pool)
}

#[cfg(not(feature = "database"))]
pub async fn create_pool(_database_url: &str) -> Result<(), DbError> {
    Err(DbError::Configuration(
        "Database support not enabled. Compile with --features database".to_string(),
    ))
}

#[cfg(not(feature = "database"))]
pub async fn create_pool_with_options(
    _database_url: &str,
    _options: PoolOptions,
) -> Result<(), DbError> {
    Err(DbError::Configuration(
        "Database support not enabled. Compile with --features database".to_string(),
    ))
}
