//! # Database Pool
//!
//! One SQLite file shared by every back-office request.
//!
//! ## Writers and the Write Lock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Concurrent Requests, One File                       │
//! │                                                                         │
//! │  POST /sales ──────┐                                                    │
//! │  POST /cash/close ─┼──► SqlitePool (max_connections) ──► pastificio.db  │
//! │  GET  /orders ─────┘                                     (WAL journal)  │
//! │                                                                         │
//! │  Readers never wait: WAL gives each one a snapshot.                    │
//! │                                                                         │
//! │  Writers take turns on SQLite's single write lock. A writer that       │
//! │  finds it held waits up to `busy_timeout` before failing with          │
//! │  "database is locked". Every multi-statement write in the             │
//! │  repositories starts with its write, so the wait happens on the       │
//! │  first statement and the snapshot is never stale.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::cash_session::CashSessionRepository;
use crate::repository::order::OrderRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/pastificio/pastificio.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created if missing. `:memory:` for a private database.
    pub database_path: PathBuf,

    /// Pool size. Default: 5.
    pub max_connections: u32,

    /// How long a writer waits for the write lock. Default: 5 seconds.
    pub busy_timeout: Duration,

    /// How long a request waits for a free pooled connection before the
    /// store reports itself unavailable. Default: 30 seconds.
    pub acquire_timeout: Duration,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(30),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// A private in-memory database for unit tests.
    ///
    /// Each connection to `:memory:` would see its own empty database, so
    /// the pool is limited to one connection. Tests that need real write
    /// contention use a temporary file with [`DbConfig::new`] instead.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle on the pool; hands out repositories.
///
/// Cheap to clone: every repository gets its own handle on the shared pool.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./pastificio.db")).await?;
/// let open = db.cash_sessions().find_open().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and applies pending migrations.
    ///
    /// Every connection runs with WAL journaling, `synchronous = NORMAL`,
    /// foreign keys on and the configured busy timeout.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Off by default in SQLite; the schema relies on them.
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!(busy_timeout = ?config.busy_timeout, "Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        migrations::run_migrations(&pool).await?;

        Ok(Database { pool })
    }

    /// Raw pool access, for tests and diagnostics.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Catalog reads and the stock compare-and-swap.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    pub fn cash_sessions(&self) -> CashSessionRepository {
        CashSessionRepository::new(self.pool.clone())
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    /// Closes the pool on shutdown. Later repository calls fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// `true` when a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert!(total >= 1);
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_closed_pool_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/pastificio.db")
            .max_connections(10)
            .busy_timeout(Duration::from_millis(750));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.busy_timeout, Duration::from_millis(750));
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
    }
}
