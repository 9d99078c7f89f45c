//! Database schema and migrations.

use super::DbError;

/// Runs database migrations.
#[cfg(feature = "database")]
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<(), DbError> {
    use tracing::info;

    info!("Running SQLite migrations");
    sqlx::migrate!("src/db/migrations/sqlite").run(pool).await?;
    info!("Migrations completed successfully");
    Ok(())
}

#[cfg(not(feature = "database"))]
pub async fn run_migrations(_pool: &()) -> Result<(), DbError> {
    Err(DbError::Configuration(
        "Database support not enabled".to_string(),
    ))
}
