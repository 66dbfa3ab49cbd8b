//! Postgres connection pool for the status store.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::DbError;

pub type DbPool = PgPool;

/// A status read that waits longer than this for a connection fails and is
/// reported as transient.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to `database_url` with at most `max_connections` connections.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    info!("Connecting to status database (max_connections={})", max_connections);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Apply the embedded migrations from the workspace `migrations/` directory.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    info!("Applying status store migrations");
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
