//! # Pastificio Back-Office API
//!
//! HTTP/JSON surface over the commerce engines. The binary in `main.rs`
//! only loads configuration, opens the database and serves [`app`]; the
//! router lives here so it can be driven in tests without a socket.
//!
//! ## Modules
//! - [`routes`] - Handlers grouped by engine
//! - [`error`] - `ApiError` and status mapping
//! - [`identity`] - Caller extraction from headers
//! - [`state`] - Shared handler state

pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

pub use error::{ApiError, ErrorCode};
pub use state::AppState;

/// The complete application router.
pub fn app(state: AppState) -> axum::Router {
    routes::router(state)
}
