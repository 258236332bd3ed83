//! Store configuration.

use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Postgres connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Postgres connection string
    pub database_url: String,
    /// Pool size
    pub max_connections: u32,
    /// How long to wait for a pooled connection
    pub acquire_timeout: Duration,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(10),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::validation("DATABASE_URL must be set"))?;

        Ok(Self {
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(10),
            acquire_timeout: Duration::from_secs(
                std::env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            ..Self::new(database_url)
        })
    }
}
