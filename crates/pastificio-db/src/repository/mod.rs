//! # Repository Module
//!
//! Database repository implementations for the back-office store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  pastificio-commerce (engines)                                         │
//! │       │                                                                 │
//! │       │  db.products().try_consume("FUS-500", 3.0)                     │
//! │       ▼                                                                 │
//! │  ProductRepository / SaleRepository / CashSessionRepository /          │
//! │  OrderRepository                                                       │
//! │       │                                                                 │
//! │       │  SQL (conditional UPDATEs, single transactions)                │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Repositories hold no state besides the pool. Every invariant that    │
//! │  must survive concurrency lives in a statement or a constraint.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog reads and stock CAS
//! - [`SaleRepository`](sale::SaleRepository) - Sales, items, void-with-restock
//! - [`CashSessionRepository`](cash_session::CashSessionRepository) - Drawer sessions
//! - [`OrderRepository`](order::OrderRepository) - Orders and conversion link

pub mod cash_session;
pub mod order;
pub mod product;
pub mod sale;

/// Shared test fixtures.
#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use pastificio_core::{Product, UnitOfMeasure};

    pub fn product(id: &str, measure: UnitOfMeasure, price: i64, stock: f64) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            description: format!("Product {}", id),
            category: "pasta".to_string(),
            unit_price_cents: price,
            unit_of_measure: measure,
            stock_quantity: stock,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
