//! # pastificio-db: Database Layer for the Pastificio Back-Office
//!
//! SQLite persistence for the commerce core, using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Back-Office Data Flow                               │
//! │                                                                         │
//! │  HTTP handler (POST /sales)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pastificio-commerce (SaleEngine, StockLedger, ...)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                pastificio-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │   Repositories     │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded) │  │   │
//! │  │   │               │    │ ProductRepository  │  │            │  │   │
//! │  │   │ SqlitePool    │◄───│ SaleRepository     │  │ 001_init   │  │   │
//! │  │   │ WAL, FKs on   │    │ CashSessionRepo    │  │            │  │   │
//! │  │   │               │    │ OrderRepository    │  │            │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (path from BackOfficeConfig)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pastificio_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("pastificio.db")).await?;
//! let open = db.cash_sessions().find_open().await?;
//! ```
//!
//! Queries are built at runtime (`sqlx::query` / `query_as` with
//! `FromRow`), so building the crate never needs a live database.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cash_session::{CashSessionRepository, ClosedSession, SessionClose};
pub use repository::order::OrderRepository;
pub use repository::product::{ConsumeRejection, ConsumedStock, ProductRepository};
pub use repository::sale::SaleRepository;
