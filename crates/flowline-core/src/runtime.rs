// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared runtime handles.
//!
//! A [`Runtime`] bundles the handles every operation needs: the database
//! pool (the single source of truth for session and run state), the Redis
//! client (courier queue only, written post-commit), and configuration. It
//! is created once at service startup and threaded through call paths.

use sqlx::PgPool;

use crate::config::Config;
use crate::error::{CoreError, Result};

/// Shared handles for database, courier queue and configuration.
#[derive(Clone)]
pub struct Runtime {
    /// Database pool.
    pub db: PgPool,
    /// Redis client for the courier queue.
    pub redis: redis::Client,
    /// Loaded configuration.
    pub config: Config,
}

impl Runtime {
    /// Connect the database pool and Redis client from configuration.
    pub async fn new(config: Config) -> Result<Self> {
        let db = PgPool::connect(&config.database_url)
            .await
            .map_err(|e| CoreError::Storage {
                operation: "connect",
                details: e.to_string(),
            })?;

        let redis = redis::Client::open(config.redis_url.as_str())?;

        Ok(Self { db, redis, config })
    }

    /// Build a runtime around existing handles, e.g. in tests.
    pub fn with_handles(db: PgPool, redis: redis::Client, config: Config) -> Self {
        Self { db, redis, config }
    }
}
