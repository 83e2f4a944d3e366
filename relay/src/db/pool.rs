//! Async connection pool factory with dual-backend support.
//!
//! Builds an [`sqlx::AnyPool`] from a `DATABASE_URL` that may point at
//! either PostgreSQL or SQLite. The backend is selected purely by URL
//! scheme; all query code above this module is driver-agnostic.

use anyhow::{Context, Result};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::AnyPool;

use crate::config::Config;

pub async fn create_pool(config: &Config) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();

    if config.database_url.starts_with("sqlite") {
        tracing::info!("connecting to sqlite backend");
    } else if config.database_url.starts_with("postgres") {
        tracing::info!("connecting to postgres backend");
    } else {
        anyhow::bail!("unsupported DATABASE_URL scheme: {}", config.database_url);
    }

    let pool = AnyPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    Ok(pool)
}

/// True when the pool is backed by SQLite (some statements, e.g. upserts,
/// use slightly different syntax per backend).
pub fn is_sqlite(config: &Config) -> bool {
    config.database_url.starts_with("sqlite")
}

pub fn row_get_str(row: &AnyRow, idx: usize) -> Option<String> {
    use sqlx::Row;
    row.try_get::<String, _>(idx).ok()
}
