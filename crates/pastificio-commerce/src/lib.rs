//! # pastificio-commerce: Transactional Engines
//!
//! Orchestrates the invariants that span entities: stock consumed by sales,
//! cash sessions reconciled against those sales, orders converted into
//! sales. All coordination goes through SQLite (conditional updates,
//! constraints and short transactions); nothing here holds a lock across
//! an await.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              BackOffice                                 │
//! │                                                                         │
//! │   ┌──────────────┐      ┌──────────────┐      ┌──────────────────┐     │
//! │   │ OrderEngine  │─────►│  SaleEngine  │─────►│   StockLedger    │     │
//! │   │              │      │              │      │                  │     │
//! │   │ state machine│      │ all-or-none  │      │ CAS decrement    │     │
//! │   │ conversion   │      │ compensation │      │ restore          │     │
//! │   └──────┬───────┘      └──────▲───────┘      └──────────────────┘     │
//! │          │                     │ cash totals                            │
//! │          │              ┌──────┴─────────────┐                          │
//! │          └─────────────►│      Catalog       │◄── batch lookups         │
//! │                         └────────────────────┘                          │
//! │                         ┌────────────────────┐                          │
//! │                         │ CashSessionManager │ open / close / reconcile │
//! │                         └────────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`stock`] - Stock ledger, the only writer of stock quantities
//! - [`sale`] - Sale creation, cancellation and queries
//! - [`cash`] - Cash-drawer sessions and reconciliation
//! - [`order`] - Customer orders and their conversion into sales
//! - [`catalog`] - Product lookups
//! - [`config`] - Layered back-office configuration
//! - [`error`] - Engine and configuration errors

pub mod cash;
pub mod catalog;
pub mod config;
pub mod error;
pub mod order;
pub mod sale;
pub mod stock;

pub use cash::{CashClosing, CashSessionManager, CashSessionSummary};
pub use catalog::Catalog;
pub use config::{BackOfficeConfig, DatabaseSettings, SalesSettings, ServerSettings};
pub use error::{CommerceError, CommerceResult, ConfigError, ConfigResult};
pub use order::{CreateOrderRequest, OrderEngine, PricedOrder, PricedOrderLine};
pub use sale::{CreateSaleRequest, SaleEngine};
pub use stock::{StockConsumption, StockLedger};

use pastificio_db::Database;

/// The engines wired to one database.
///
/// Cheap to clone: every engine only holds repository handles around the
/// shared pool.
#[derive(Debug, Clone)]
pub struct BackOffice {
    #[cfg(test)]
    catalog: Catalog,
    stock: StockLedger,
    sales: SaleEngine,
    cash: CashSessionManager,
    orders: OrderEngine,
}

impl BackOffice {
    pub fn new(db: &Database, settings: &SalesSettings) -> Self {
        let catalog = Catalog::new(db.products());
        let stock = StockLedger::new(db.products());
        let sales = SaleEngine::new(
            db.sales(),
            catalog.clone(),
            stock.clone(),
            settings.max_lines,
        );
        let cash = CashSessionManager::new(db.cash_sessions(), sales.clone());
        let orders = OrderEngine::new(db.orders(), catalog.clone(), sales.clone(), settings.max_lines);

        BackOffice {
            #[cfg(test)]
            catalog,
            stock,
            sales,
            cash,
            orders,
        }
    }

    /// Direct catalog writes for seeding engine tests.
    #[cfg(test)]
    pub(crate) fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stock(&self) -> &StockLedger {
        &self.stock
    }

    pub fn sales(&self) -> &SaleEngine {
        &self.sales
    }

    pub fn cash(&self) -> &CashSessionManager {
        &self.cash
    }

    pub fn orders(&self) -> &OrderEngine {
        &self.orders
    }
}
