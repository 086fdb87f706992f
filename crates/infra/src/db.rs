//! Postgres connection pool.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::DatabaseConfig;

/// Open the shared pool. The handle is passed explicitly to whatever needs it.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect_with(config.connect.clone())
        .await?;

    info!(
        host = config.connect.get_host(),
        database = config.connect.get_database().unwrap_or_default(),
        max_connections = config.max_connections,
        idle_timeout_secs = config.idle_timeout.as_secs(),
        "database pool ready"
    );
    Ok(pool)
}
