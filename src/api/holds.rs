use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::post,
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::middleware::auth::optional_auth;
use crate::api::{bounded, AppState};
use crate::error::Result;
use crate::services::holds::{self, HoldGrant};
use crate::services::Caller;

#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    pub seat_nos: Vec<String>,
    pub ttl_seconds: Option<u64>,
}

async fn create_hold(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateHoldRequest>,
) -> Result<(StatusCode, Json<HoldGrant>)> {
    let ttl = req
        .ttl_seconds
        .map(Duration::from_secs)
        .unwrap_or_else(|| state.config.hold_ttl());

    let grant = bounded(
        &state,
        holds::create_hold(&state.pool, event_id, &req.seat_nos, &caller, ttl),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(grant)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/events/:id/holds", post(create_hold))
        .route_layer(middleware::from_fn_with_state(state.clone(), optional_auth))
}
