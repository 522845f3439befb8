//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Back-Office API                    │
//! │                                                                         │
//! │  Handler ── Result<Json<T>, ApiError>                                   │
//! │     │                                                                   │
//! │     ├─ CommerceError::Core ── kind() ──┬─ Validation → 400              │
//! │     │                                  ├─ NotFound   → 404              │
//! │     │                                  └─ Conflict   → 409 + code       │
//! │     │                                                                   │
//! │     └─ CommerceError::Db ── logged ───── 503 if unavailable, else 500   │
//! │                                          (detail never sent)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Response Body
//! ```json
//! {
//!   "code": "INSUFFICIENT_STOCK",
//!   "message": "Insufficient stock for RAV-BOX: 2 available, 3 requested"
//! }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use pastificio_commerce::CommerceError;
use pastificio_core::{CoreError, ErrorKind, ValidationError};
use pastificio_db::DbError;

/// Error returned by every handler.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    #[serde(skip)]
    status: StatusCode,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Resource not found (404)
    NotFound,

    /// Not enough stock for a line (409)
    InsufficientStock,

    /// Drawer already open, or none open (409)
    CashSessionConflict,

    /// Order state machine or conversion conflict (409)
    OrderConflict,

    /// Sale cannot be cancelled, or changed concurrently (409)
    SaleConflict,

    /// Store failed (500 / 503)
    DatabaseError,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            status,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, ErrorCode::ValidationError, message)
    }

    fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::CONFLICT, code, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Converts store failures to API errors. The detail is only logged.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        error!(error = %err, "Database operation failed");

        if err.is_unavailable() {
            ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::DatabaseError,
                "Database temporarily unavailable",
            )
        } else {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::DatabaseError,
                "Database operation failed",
            )
        }
    }
}

/// Converts business errors to API errors.
///
/// The status follows the error's kind; conflicts also carry the code of the
/// aggregate that refused the change.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => ApiError::validation(message),
            ErrorKind::NotFound => {
                ApiError::new(StatusCode::NOT_FOUND, ErrorCode::NotFound, message)
            }
            ErrorKind::Conflict => ApiError::conflict(conflict_code(&err), message),
        }
    }
}

fn conflict_code(err: &CoreError) -> ErrorCode {
    match err {
        CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
        CoreError::AlreadyOpen { .. } | CoreError::NoOpenSession => {
            ErrorCode::CashSessionConflict
        }
        CoreError::InvalidTransition { .. }
        | CoreError::NoLinkedSale(_)
        | CoreError::OrderCancelled(_)
        | CoreError::AlreadyConverted { .. } => ErrorCode::OrderConflict,
        CoreError::ConcurrentModification { entity, .. } => match entity.as_str() {
            "Order" => ErrorCode::OrderConflict,
            "CashSession" => ErrorCode::CashSessionConflict,
            _ => ErrorCode::SaleConflict,
        },
        _ => ErrorCode::SaleConflict,
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<CommerceError> for ApiError {
    fn from(err: CommerceError) -> Self {
        match err {
            CommerceError::Core(err) => err.into(),
            CommerceError::Db(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err: ApiError = CoreError::EmptyItems.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err: ApiError = CoreError::InsufficientStock {
            product_id: "A".into(),
            available: 1.0,
            requested: 2.0,
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code, ErrorCode::InsufficientStock);

        let err: ApiError = CoreError::NoOpenSession.into();
        assert_eq!(err.code, ErrorCode::CashSessionConflict);

        let err: ApiError = CoreError::OrderNotFound("o".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = DbError::PoolExhausted.into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn test_body_shape() {
        let err: ApiError = CoreError::NoLinkedSale("o-1".into()).into();
        let body = serde_json::to_value(&err).unwrap();
        assert_eq!(body["code"], "ORDER_CONFLICT");
        assert!(body["message"].as_str().unwrap().contains("o-1"));
        assert!(body.get("status").is_none());
    }
}
