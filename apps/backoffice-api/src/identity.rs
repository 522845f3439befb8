//! # Caller Identity
//!
//! The identity collaborator puts the caller in two headers:
//!
//! ```text
//! X-User-Id:   u-42        (required, recorded on every write)
//! X-User-Role: cashier     (optional, defaults to "staff")
//! ```
//!
//! Nothing is authenticated here; a request without a user id is rejected
//! with 400.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use pastificio_core::Caller;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

const DEFAULT_ROLE: &str = "staff";

/// Extractor for the calling user.
#[derive(Debug, Clone)]
pub struct Identity(pub Caller);

impl Identity {
    fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let user_id = header_text(headers, USER_ID_HEADER)
            .ok_or_else(|| ApiError::validation("Missing X-User-Id header"))?;
        let role = header_text(headers, USER_ROLE_HEADER).unwrap_or(DEFAULT_ROLE);

        Ok(Identity(Caller::new(user_id, role)))
    }
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Identity::from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_headers() {
        let mut headers = HeaderMap::new();
        assert!(Identity::from_headers(&headers).is_err());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert!(Identity::from_headers(&headers).is_err());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-7"));
        let Identity(caller) = Identity::from_headers(&headers).unwrap();
        assert_eq!(caller.user_id, "u-7");
        assert_eq!(caller.role, "staff");

        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("manager"));
        let Identity(caller) = Identity::from_headers(&headers).unwrap();
        assert_eq!(caller.role, "manager");
    }
}
