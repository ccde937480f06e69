//! Shared harness for integration tests.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use activity_core::run_migrations;

/// Fresh in-memory database with the schema applied.
///
/// A single connection keeps the in-memory database alive and shared; the
/// pool never retires it mid-test.
pub async fn test_pool() -> SqlitePool {
    // Respect RUST_LOG when debugging: RUST_LOG=debug cargo test -- --nocapture
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
