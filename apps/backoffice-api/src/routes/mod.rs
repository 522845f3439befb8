//! # HTTP Routes
//!
//! One module per engine. Handlers stay thin: extract, call the engine,
//! wrap the result; errors become [`ApiError`] responses.

pub mod cash;
pub mod orders;
pub mod sales;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound on any list response.
pub const MAX_LIST_LIMIT: u32 = 500;

/// Builds the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(sales::router())
        .merge(cash::router())
        .merge(orders::router())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.db().health_check().await {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

/// Resolves a `limit` query parameter.
pub fn list_limit(requested: Option<u32>, default: u32) -> Result<u32, ApiError> {
    match requested {
        None => Ok(default.min(MAX_LIST_LIMIT)),
        Some(limit) if (1..=MAX_LIST_LIMIT).contains(&limit) => Ok(limit),
        Some(_) => Err(ApiError::validation(format!(
            "limit must be between 1 and {}",
            MAX_LIST_LIMIT
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use chrono::Utc;
    use pastificio_commerce::BackOfficeConfig;
    use pastificio_core::{Product, UnitOfMeasure};
    use pastificio_db::{Database, DbConfig};

    async fn app() -> Router {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        db.products()
            .upsert(&Product {
                id: "FUS-500".to_string(),
                description: "Fusilli 500 g".to_string(),
                category: "dry".to_string(),
                unit_price_cents: 250,
                unit_of_measure: UnitOfMeasure::Unit,
                stock_quantity: 10.0,
                active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        router(AppState::new(db, &BackOfficeConfig::default()))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", "u-1")
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[test]
    fn test_list_limit() {
        assert_eq!(list_limit(None, 50).unwrap(), 50);
        assert_eq!(list_limit(Some(10), 50).unwrap(), 10);
        assert!(list_limit(Some(0), 50).is_err());
        assert!(list_limit(Some(MAX_LIST_LIMIT + 1), 50).is_err());
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sale_flow() {
        let app = app().await;

        let (status, sale) = call(
            &app,
            Method::POST,
            "/sales",
            Some(json!({
                "items": [{"productId": "FUS-500", "quantity": 3}],
                "paymentMethod": "cash"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sale["totalCents"], 750);
        assert_eq!(sale["state"], "completed");
        let id = sale["id"].as_str().unwrap().to_string();

        let (status, recent) = call(&app, Method::GET, "/sales/recent?limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(recent.as_array().unwrap().len(), 1);

        // No drawer was open.
        let (status, loose) = call(&app, Method::GET, "/sales/unattributed", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(loose[0]["id"], id.as_str());

        let (status, voided) =
            call(&app, Method::POST, &format!("/sales/{}/cancel", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(voided["state"], "voided");

        let (status, err) = call(
            &app,
            Method::POST,
            "/sales",
            Some(json!({
                "items": [{"productId": "FUS-500", "quantity": 11}],
                "paymentMethod": "cash"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "INSUFFICIENT_STOCK");

        let (status, err) = call(&app, Method::GET, "/sales/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_missing_identity_is_rejected() {
        let app = app().await;
        let request = Request::post("/cash/open")
            .header("content-type", "application/json")
            .body(Body::from(json!({"openingAmountCents": 1000}).to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cash_flow() {
        let app = app().await;

        let (status, current) = call(&app, Method::GET, "/cash/current", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(current.is_null());

        let (status, _) = call(
            &app,
            Method::POST,
            "/cash/open",
            Some(json!({"openingAmountCents": 5000})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, err) = call(
            &app,
            Method::POST,
            "/cash/open",
            Some(json!({"openingAmountCents": 5000})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "CASH_SESSION_CONFLICT");

        call(
            &app,
            Method::POST,
            "/sales",
            Some(json!({
                "items": [{"productId": "FUS-500", "quantity": 2}],
                "paymentMethod": "cash"
            })),
        )
        .await;

        let (_, current) = call(&app, Method::GET, "/cash/current", None).await;
        assert_eq!(current["expectedAmount"], 5500);

        let (status, closing) = call(
            &app,
            Method::POST,
            "/cash/close",
            Some(json!({"realClosingAmountCents": 5500})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(closing["cashSalesTotal"], 500);
        assert_eq!(closing["discrepancy"], 0);
        let session_id = closing["session"]["id"].as_str().unwrap().to_string();

        let (status, sales) = call(
            &app,
            Method::GET,
            &format!("/cash/sessions/{}/sales", session_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sales.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_order_flow() {
        let app = app().await;

        let (status, order) = call(
            &app,
            Method::POST,
            "/orders",
            Some(json!({"items": [{"productId": "FUS-500", "quantity": 2}], "client": "Gino"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = order["id"].as_str().unwrap().to_string();

        let (status, err) = call(
            &app,
            Method::PUT,
            &format!("/orders/{}/state", id),
            Some(json!({"state": "delivered"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "ORDER_CONFLICT");

        let (status, priced) = call(&app, Method::GET, &format!("/orders/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(priced["estimatedTotal"], 500);

        let (status, converted) = call(
            &app,
            Method::POST,
            &format!("/orders/{}/sale", id),
            Some(json!({"paymentMethod": "digital_wallet"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(converted["order"]["state"], "delivered");
        assert_eq!(converted["order"]["linkedSaleId"], converted["sale"]["id"]);

        let (status, listed) = call(&app, Method::GET, "/orders?state=delivered", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }
}
