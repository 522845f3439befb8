//! # Error Types
//!
//! Domain-specific error types for pastificio-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pastificio-core errors (this file)                                    │
//! │  ├── CoreError        - Business rule failures (kind(): Validation,    │
//! │  │                      Conflict, NotFound)                            │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  pastificio-db errors                                                  │
//! │  └── DbError          - Infrastructure (store unreachable, SQL errors) │
//! │                                                                         │
//! │  backoffice-api errors                                                 │
//! │  └── ApiError         - What the frontend sees (code + message)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The split between [`ErrorKind::Validation`] and [`ErrorKind::Conflict`]
//! lets the UI offer different remediation: "fix the input" versus
//! "open a cash register first".

use thiserror::Error;

use crate::types::{OrderState, SaleState};

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-correctable input problem.
    Validation,
    /// The request is valid but clashes with current state.
    Conflict,
    /// A referenced sale, order or session does not exist.
    NotFound,
}

// =============================================================================
// Core Error
// =============================================================================

/// Business errors of the commerce core.
#[derive(Debug, Error)]
pub enum CoreError {
    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------
    /// A sale or order was submitted without any line.
    #[error("At least one item is required")]
    EmptyItems,

    /// Product id is not in the catalog.
    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    /// Product exists but has been deactivated in the catalog.
    #[error("Product {0} is not active")]
    ProductInactive(String),

    /// Quantity is non-positive, not finite, or fractional for a
    /// unit-measured product.
    #[error("Invalid quantity {quantity} for product {product_id}: {reason}")]
    InvalidQuantity {
        product_id: String,
        quantity: f64,
        reason: String,
    },

    /// Generic input validation failure.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // -------------------------------------------------------------------------
    // Conflict
    // -------------------------------------------------------------------------
    /// Not enough stock to consume the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale: 3 × Ravioli ricotta (Box)
    ///      │
    ///      ▼
    /// try_consume: available = 2
    ///      │
    ///      ▼
    /// InsufficientStock { product_id, available: 2, requested: 3 }
    ///      │
    ///      ▼
    /// Earlier lines restored, UI shows "Only 2 in stock"
    /// ```
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: f64,
        requested: f64,
    },

    /// A cash session is already open.
    #[error("A cash session is already open ({session_id})")]
    AlreadyOpen { session_id: String },

    /// Close was requested but no session is open.
    #[error("There is no open cash session")]
    NoOpenSession,

    /// Sale is not in a state that allows the requested operation.
    #[error("Sale {sale_id} is {state}, cannot perform operation")]
    InvalidSaleState { sale_id: String, state: SaleState },

    /// Order transition not allowed by the state machine.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderState,
        to: OrderState,
    },

    /// Order cannot be delivered before a sale has been generated for it.
    #[error("Order {0} has no linked sale and cannot be delivered")]
    NoLinkedSale(String),

    /// Order is cancelled and cannot be converted into a sale.
    #[error("Order {0} is cancelled")]
    OrderCancelled(String),

    /// Order has already been converted into a sale.
    #[error("Order {order_id} was already converted into sale {sale_id}")]
    AlreadyConverted { order_id: String, sale_id: String },

    /// The entity changed between read and conditional write.
    #[error("{entity} {id} was modified concurrently, retry the operation")]
    ConcurrentModification { entity: String, id: String },

    // -------------------------------------------------------------------------
    // Not found
    // -------------------------------------------------------------------------
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Cash session not found: {0}")]
    SessionNotFound(String),
}

impl CoreError {
    /// Returns the error category used for remediation and status codes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::EmptyItems
            | CoreError::UnknownProduct(_)
            | CoreError::ProductInactive(_)
            | CoreError::InvalidQuantity { .. }
            | CoreError::Validation(_) => ErrorKind::Validation,

            CoreError::InsufficientStock { .. }
            | CoreError::AlreadyOpen { .. }
            | CoreError::NoOpenSession
            | CoreError::InvalidSaleState { .. }
            | CoreError::InvalidTransition { .. }
            | CoreError::NoLinkedSale(_)
            | CoreError::OrderCancelled(_)
            | CoreError::AlreadyConverted { .. }
            | CoreError::ConcurrentModification { .. } => ErrorKind::Conflict,

            CoreError::SaleNotFound(_)
            | CoreError::OrderNotFound(_)
            | CoreError::SessionNotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Creates an InvalidQuantity error.
    pub fn invalid_quantity(
        product_id: impl Into<String>,
        quantity: f64,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::InvalidQuantity {
            product_id: product_id.into(),
            quantity,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., unknown enum text).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "FUS-500".to_string(),
            available: 2.0,
            requested: 3.0,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for FUS-500: available 2, requested 3"
        );

        let err = CoreError::InvalidTransition {
            order_id: "o-1".to_string(),
            from: OrderState::Delivered,
            to: OrderState::Pending,
        };
        assert_eq!(
            err.to_string(),
            "Order o-1 cannot move from delivered to pending"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(CoreError::EmptyItems.kind(), ErrorKind::Validation);
        assert_eq!(
            CoreError::UnknownProduct("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(CoreError::NoOpenSession.kind(), ErrorKind::Conflict);
        assert_eq!(
            CoreError::AlreadyOpen {
                session_id: "s".into()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CoreError::OrderNotFound("o".into()).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "client".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }
}
