// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

/// Flowline core configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Redis connection URL for the courier queue
    pub redis_url: String,
    /// Default messages-per-second rate encoded into courier queue keys
    pub courier_default_tps: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `FLOWLINE_DATABASE_URL`: PostgreSQL connection string
    ///
    /// Optional (with defaults):
    /// - `FLOWLINE_REDIS_URL`: Redis connection string (default: `redis://localhost:6379/0`)
    /// - `FLOWLINE_COURIER_DEFAULT_TPS`: courier queue rate (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("FLOWLINE_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("FLOWLINE_DATABASE_URL"))?;

        let redis_url = std::env::var("FLOWLINE_REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379/0".to_string());

        let courier_default_tps: u32 = std::env::var("FLOWLINE_COURIER_DEFAULT_TPS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("FLOWLINE_COURIER_DEFAULT_TPS", "must be a positive integer")
            })?;

        Ok(Self {
            database_url,
            redis_url,
            courier_default_tps,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
