//! # Connection Pool
//!
//! One [`Database`] per process. Services open a transaction per unit of
//! work (an order, a callback, a cancellation) and thread `&mut *tx`
//! through the repositories.
//!
//! ```text
//! DbConfig ──► SqliteConnectOptions ──► SqlitePool ──► migrations
//!                (WAL, foreign keys,                      │
//!                 busy timeout)                           ▼
//!                                            Database::begin() per request
//! ```

use std::path::PathBuf;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Pool settings.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/souq/souq.db").max_connections(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    location: Location,
    max_connections: u32,
    acquire_timeout: Duration,
    /// How long a writer waits on SQLite's lock before failing.
    busy_timeout: Duration,
    migrate: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: Location::File(path.into()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    /// A private database on a single connection. Callers must not touch
    /// the pool while a transaction from it is open.
    pub fn in_memory() -> Self {
        DbConfig {
            location: Location::Memory,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.migrate = run;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self.location, Location::Memory)
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = match &self.location {
            Location::Memory => SqliteConnectOptions::new().in_memory(true),
            Location::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
        };
        options.foreign_keys(true).busy_timeout(self.busy_timeout)
    }

    fn describe(&self) -> String {
        match &self.location {
            Location::File(path) => path.display().to_string(),
            Location::Memory => ":memory:".to_string(),
        }
    }
}

/// Shared pool handle; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(database = %config.describe(), "Opening database");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout);
        if config.is_in_memory() {
            // the database is gone once its connection closes
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!(max_connections = config.max_connections, "Pool ready");

        let db = Database { pool };
        if config.migrate {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Dropping the transaction without `commit()` rolls it back.
    pub async fn begin(&self) -> DbResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }

    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
