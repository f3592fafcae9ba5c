//! Persistence layer of the sync hub.
//!
//! [`store::Store`] is the seam the rest of the hub talks to. [`PgStore`]
//! implements it over PostgreSQL through the per-table repositories in
//! [`repositories`]; [`MemoryStore`] implements it in process.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use synchub_core::backoff::BackoffConfig;

pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod repositories;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use pg::PgStore;
pub use store::Store;

pub type DbPool = sqlx::PgPool;

/// Maximum pooled connections.
const MAX_CONNECTIONS: u32 = 25;

/// Connections kept open while idle.
const MIN_CONNECTIONS: u32 = 5;

/// Connections are recycled after this long.
const MAX_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Time allowed for a single connect attempt.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Create a connection pool from connect options.
pub async fn create_pool(options: PgConnectOptions) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .min_connections(MIN_CONNECTIONS)
        .max_lifetime(MAX_LIFETIME)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await
}

/// Create a pool, retrying with exponential backoff and jitter.
///
/// Returns the last error once `backoff.max_attempts` attempts have failed.
pub async fn connect_with_retry(
    options: PgConnectOptions,
    backoff: &BackoffConfig,
) -> Result<DbPool, sqlx::Error> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match create_pool(options.clone()).await {
            Ok(pool) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Database connection established after retry");
                }
                return Ok(pool);
            }
            Err(e) if attempt < backoff.max_attempts => {
                let delay = backoff.jittered_delay(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = backoff.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Database connection failed, retrying",
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(attempt, error = %e, "Database connection failed, giving up");
                return Err(e);
            }
        }
    }
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations in `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
