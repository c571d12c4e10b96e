//! SQLite-backed store shared by every engine instance.
//!
//! The database file is the only shared state. Several processes may open the
//! same file; SQLite serializes their writers and the `room_restrictions`
//! triggers reject overlapping spans, so no in-process locking is needed.

use std::str::FromStr;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, Transaction};
use tracing::info;

use crate::config::Config;
use crate::engine::EngineError;

pub(crate) mod rows;

/// Schema migrations embedded from `migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open a pool with WAL journaling, foreign keys on and a bounded lock wait.
    ///
    /// `sqlite::memory:` gives every pooled connection its own database; use
    /// `max_connections = 1` with it.
    pub async fn connect(config: &Config) -> Result<Self, EngineError> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.op_timeout)
            .connect_with(options)
            .await?;

        info!(
            "store opened: {} (max_connections={})",
            config.database_url, config.max_connections
        );
        Ok(Self { pool })
    }

    /// Apply pending migrations. Safe to run from every instance at startup.
    pub async fn migrate(&self) -> Result<(), EngineError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction. It rolls back if dropped without `commit`, which
    /// is what a deadline expiry does.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, EngineError> {
        Ok(self.pool.begin().await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
