//! # Sale Routes
//!
//! ```text
//! POST /sales               create a sale
//! GET  /sales?from&to&state list by date range (inclusive)
//! GET  /sales/recent?limit  most recent first
//! GET  /sales/unattributed?from&to
//!                           completed sales made with no drawer open
//! GET  /sales/{id}
//! POST /sales/{id}/cancel   void and restore stock
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use pastificio_commerce::CreateSaleRequest;
use pastificio_core::{Sale, SaleState};

use super::{list_limit, LimitQuery};
use crate::error::ApiError;
use crate::identity::Identity;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales", post(create_sale).get(list_sales))
        .route("/sales/recent", get(list_recent))
        .route("/sales/unattributed", get(list_unattributed))
        .route("/sales/{id}", get(get_sale))
        .route("/sales/{id}/cancel", post(cancel_sale))
}

#[derive(Debug, Deserialize)]
pub struct SalesRangeQuery {
    /// Defaults to 24 hours before `to`.
    pub from: Option<DateTime<Utc>>,
    /// Defaults to now.
    pub to: Option<DateTime<Utc>>,
    /// Comma separated, e.g. `completed,voided`.
    pub state: Option<String>,
}

fn parse_states(raw: &str) -> Result<Vec<SaleState>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<SaleState>().map_err(ApiError::from))
        .collect()
}

async fn create_sale(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Json(request): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<Sale>), ApiError> {
    debug!(lines = request.items.len(), user = %caller.user_id, "create_sale");

    let sale = state.office().sales().create_sale(request, &caller).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

async fn list_sales(
    State(state): State<AppState>,
    Query(query): Query<SalesRangeQuery>,
) -> Result<Json<Vec<Sale>>, ApiError> {
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query.from.unwrap_or(to - Duration::hours(24));
    let states = query.state.as_deref().map(parse_states).transpose()?;

    let sales = state
        .office()
        .sales()
        .list_by_date_range(from, to, states.as_deref())
        .await?;
    Ok(Json(sales))
}

async fn list_recent(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Sale>>, ApiError> {
    let limit = list_limit(query.limit, state.recent_limit())?;
    Ok(Json(state.office().sales().list_recent(limit).await?))
}

async fn list_unattributed(
    State(state): State<AppState>,
    Query(query): Query<SalesRangeQuery>,
) -> Result<Json<Vec<Sale>>, ApiError> {
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query.from.unwrap_or(to - Duration::hours(24));

    Ok(Json(state.office().sales().list_unattributed(from, to).await?))
}

async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Sale>, ApiError> {
    Ok(Json(state.office().sales().get_by_id(&id).await?))
}

async fn cancel_sale(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<Sale>, ApiError> {
    Ok(Json(state.office().sales().cancel_sale(&id, &caller).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_states() {
        assert_eq!(
            parse_states("completed, voided").unwrap(),
            vec![SaleState::Completed, SaleState::Voided]
        );
        assert!(parse_states("completed,lost").is_err());
        assert!(parse_states("").unwrap().is_empty());
    }
}
