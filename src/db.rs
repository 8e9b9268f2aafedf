//! Database pool setup for the Postgres document store.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::DatabaseConfig;

/// Type alias for the application database pool.
pub type AppDb = PgPool;

/// Connect and bring the schema up to date.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<AppDb> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    info!("Connected to application database");

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Application migrations complete");

    Ok(pool)
}
