//! # Cash Session Routes
//!
//! ```text
//! POST /cash/open                 open the drawer
//! POST /cash/close                close and reconcile
//! GET  /cash/current              open session summary, or null
//! GET  /cash/sessions?limit       most recent first
//! GET  /cash/sessions/{id}
//! GET  /cash/sessions/{id}/sales  sales attributed to the session
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use pastificio_commerce::{CashClosing, CashSessionSummary};
use pastificio_core::{CashSession, Money, Sale};

use super::{list_limit, LimitQuery};
use crate::error::ApiError;
use crate::identity::Identity;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cash/open", post(open_session))
        .route("/cash/close", post(close_session))
        .route("/cash/current", get(current_session))
        .route("/cash/sessions", get(list_sessions))
        .route("/cash/sessions/{id}", get(get_session))
        .route("/cash/sessions/{id}/sales", get(session_sales))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub opening_amount_cents: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionRequest {
    pub real_closing_amount_cents: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

async fn open_session(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Json(request): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<CashSession>), ApiError> {
    let session = state
        .office()
        .cash()
        .open(
            &caller,
            Money::from_cents(request.opening_amount_cents),
            request.notes,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn close_session(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Json(request): Json<CloseSessionRequest>,
) -> Result<Json<CashClosing>, ApiError> {
    let closing = state
        .office()
        .cash()
        .close(
            &caller,
            Money::from_cents(request.real_closing_amount_cents),
            request.notes,
        )
        .await?;
    Ok(Json(closing))
}

async fn current_session(
    State(state): State<AppState>,
) -> Result<Json<Option<CashSessionSummary>>, ApiError> {
    Ok(Json(state.office().cash().current_summary().await?))
}

async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<CashSession>>, ApiError> {
    let limit = list_limit(query.limit, state.recent_limit())?;
    Ok(Json(state.office().cash().list(limit).await?))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CashSession>, ApiError> {
    Ok(Json(state.office().cash().get_by_id(&id).await?))
}

async fn session_sales(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Sale>>, ApiError> {
    Ok(Json(state.office().cash().sales_of(&id).await?))
}
