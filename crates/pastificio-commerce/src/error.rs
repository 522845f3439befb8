//! # Commerce Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Commerce Error Categories                           │
//! │                                                                         │
//! │  ┌──────────────────────────────┐   ┌──────────────────────────────┐   │
//! │  │  CommerceError::Core         │   │  CommerceError::Db           │   │
//! │  │  (business outcome)          │   │  (infrastructure)            │   │
//! │  │                              │   │                              │   │
//! │  │  Validation  → fix input     │   │  store unreachable           │   │
//! │  │  Conflict    → retry / act   │   │  pool exhausted              │   │
//! │  │  NotFound    → wrong id      │   │  unexpected SQL failure      │   │
//! │  └──────────────────────────────┘   └──────────────────────────────┘   │
//! │                                                                         │
//! │  ┌──────────────────────────────┐                                       │
//! │  │  ConfigError                 │  startup only, never per request     │
//! │  └──────────────────────────────┘                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use pastificio_core::CoreError;
use pastificio_db::DbError;

/// Result type alias for engine operations.
pub type CommerceResult<T> = Result<T, CommerceError>;

/// Error returned by every engine operation.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// A business rule rejected the request.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The store failed.
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl From<pastificio_core::ValidationError> for CommerceError {
    fn from(err: pastificio_core::ValidationError) -> Self {
        CommerceError::Core(CoreError::Validation(err))
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is present but unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err: CommerceError = CoreError::NoOpenSession.into();
        assert!(matches!(err, CommerceError::Core(CoreError::NoOpenSession)));
        assert_eq!(err.to_string(), "There is no open cash session");

        let err: CommerceError = DbError::PoolExhausted.into();
        assert!(matches!(err, CommerceError::Db(_)));
    }
}
