//! Connection pool construction.
//!
//! The pool is the process's only shared resource: it is built once
//! at startup with explicit min/max sizing and handed to every
//! repository. Acquisition is scoped per statement inside sqlx, so a
//! cancelled caller can never leak or wedge a connection.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::DbError;

/// Configuration for the database pool.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// sqlx connection URL (e.g. `sqlite://orepass.db`,
    /// `sqlite::memory:`).
    pub url: String,
    /// Connections kept warm.
    pub min_connections: u32,
    /// Upper bound on concurrent connections.
    pub max_connections: u32,
    /// How long an operation may wait for a free connection before
    /// failing with a storage error.
    pub acquire_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://orepass.db".into(),
            min_connections: 5,
            max_connections: 20,
            acquire_timeout_secs: 30,
        }
    }
}

/// Build the process-wide pool.
///
/// Foreign keys are switched on per connection so the schema's
/// `ON DELETE CASCADE` / `ON DELETE SET NULL` semantics hold.
pub async fn connect(config: &DbConfig) -> Result<SqlitePool, DbError> {
    info!(
        url = %config.url,
        min = config.min_connections,
        max = config.max_connections,
        "connecting database pool"
    );

    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await?;

    info!("database pool ready");

    Ok(pool)
}
