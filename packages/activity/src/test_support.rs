//! Shared helpers for in-crate unit tests.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::events::store::run_migrations;

/// Fresh in-memory database with the schema applied.
///
/// A single connection keeps the in-memory database alive and shared for the
/// duration of the test; timeouts are disabled so the pool never drops it.
pub(crate) async fn test_pool() -> SqlitePool {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite pool");
    run_migrations(&pool).await.expect("migrations");
    pool
}
