//! # pastificio-core: Pure Domain Logic for the Pastificio Back-Office
//!
//! Types and rules of the transactional commerce core: sales that consume
//! stock, cash-drawer sessions reconciled against those sales, and customer
//! orders that turn into sales. Everything here is pure; persistence lives in
//! `pastificio-db` and orchestration in `pastificio-commerce`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Pastificio Back-Office Architecture                  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               React back-office (out of scope)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP / JSON                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          apps/backoffice-api  →  pastificio-commerce            │   │
//! │  │   OrderEngine ──► SaleEngine ──► StockLedger                    │   │
//! │  │   CashSessionManager ◄── (queries) SaleEngine                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ pastificio-core (THIS CRATE) ★                    │   │
//! │  │   types • money • quantity • validation • error                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, CashSession, Order) and states
//! - [`money`] - Money in integer cents
//! - [`quantity`] - Real-valued quantities and the integrality tolerance
//! - [`validation`] - Line merging and input checks shared by sales and orders
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use pastificio_core::money::Money;
//! use pastificio_core::UnitOfMeasure;
//!
//! // 0.75 kg of fresh tagliatelle at 12.40 / kg
//! let price = Money::from_cents(1240);
//! assert_eq!(price.times_quantity(0.75).cents(), 930);
//!
//! // Units must be sold whole
//! assert!(UnitOfMeasure::Unit.requires_integral_quantity());
//! ```

pub mod error;
pub mod money;
pub mod quantity;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of distinct lines accepted in a single sale or order.
///
/// Callers may configure a lower cap; this is the hard upper bound.
pub const MAX_LINES: usize = 200;

/// Generates a new entity identifier (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
