//! Single connection pool plus a write-serialization lock.
//!
//! This store has no analytics workload and a modest write volume, so one
//! pool with a `tokio::sync::Mutex` guarding all mutating calls is enough to
//! make doc-id and collection-id uniqueness checks non-racy (§4.3, §5).

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Mutex;

use docrieve_config::DatabaseConfig;

use crate::error::MetaResult;
use crate::migrations::run_migrations;

/// Holds the pool plus the lock serializing mutating repository calls.
pub struct PoolManager {
    pool: PgPool,
    write_lock: Mutex<()>,
}

impl PoolManager {
    /// Connect and, if `config.auto_migrate`, run pending migrations.
    ///
    /// # Errors
    /// Returns [`crate::MetaError`] if the connection or migrations fail.
    pub async fn connect(config: &DatabaseConfig) -> MetaResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .connect(&config.url)
            .await?;

        if config.auto_migrate {
            run_migrations(&pool).await?;
        }

        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Acquire the write-serialization lock. Hold the guard for the
    /// duration of a mutating operation.
    pub async fn write_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}
