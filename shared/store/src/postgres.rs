use sqlx::{Pool, Postgres};
use std::time::Duration;

use washpoint_utils::{StoreConfig, WashpointResult};

pub type PostgresPool = Pool<Postgres>;

pub async fn create_postgres_pool(config: &StoreConfig) -> WashpointResult<PostgresPool> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .connect(&config.postgres_url)
        .await?;

    tracing::info!("Connected to PostgreSQL record store");
    Ok(pool)
}

pub async fn health_check(pool: &PostgresPool) -> WashpointResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
