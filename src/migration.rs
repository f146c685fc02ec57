//! Database migrations.

use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::mysql::MySqlPoolOptions;
use tracing::info;

pub async fn run_migrations(config: &Config) -> Result<()> {
    info!("connecting to database for migrations");

    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .connect(&config.database.url)
        .await
        .context("failed to connect to database")?;

    info!("running database migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    info!("database migrations completed");
    Ok(())
}
