//! # Order Routes
//!
//! ```text
//! POST /orders                create (Pending)
//! GET  /orders?state&limit    most recent first
//! GET  /orders/{id}           priced from the live catalog
//! PUT  /orders/{id}/state     state machine transition
//! POST /orders/{id}/sale      convert into a sale, mark delivered
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;

use pastificio_commerce::{CreateOrderRequest, PricedOrder};
use pastificio_core::{Order, OrderState, PaymentMethod, Sale};

use super::list_limit;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/state", put(set_state))
        .route("/orders/{id}/sale", post(generate_sale))
}

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub state: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SetStateRequest {
    pub state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSaleRequest {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
pub struct GeneratedSale {
    pub sale: Sale,
    pub order: Order,
}

async fn create_order(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.office().orders().create_order(request, &caller).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let filter = query
        .state
        .as_deref()
        .map(str::parse::<OrderState>)
        .transpose()?;
    let limit = list_limit(query.limit, state.recent_limit())?;

    Ok(Json(state.office().orders().list(filter, limit).await?))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PricedOrder>, ApiError> {
    Ok(Json(state.office().orders().priced(&id).await?))
}

async fn set_state(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    Json(request): Json<SetStateRequest>,
) -> Result<Json<Order>, ApiError> {
    let target: OrderState = request.state.parse()?;
    debug!(order_id = %id, to = %target, user = %caller.user_id, "set_order_state");

    Ok(Json(state.office().orders().set_state(&id, target).await?))
}

async fn generate_sale(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    Json(request): Json<GenerateSaleRequest>,
) -> Result<Json<GeneratedSale>, ApiError> {
    let (sale, order) = state
        .office()
        .orders()
        .generate_sale_from_order(&id, request.payment_method, &caller)
        .await?;
    Ok(Json(GeneratedSale { sale, order }))
}
