use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::post,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::middleware::auth::require_auth;
use crate::api::{bounded, AppState};
use crate::error::{AppError, Result};
use crate::services::{waitlist, Caller};

#[derive(Debug, Deserialize)]
pub struct JoinWaitlistRequest {
    pub requested_seats: i32,
}

#[derive(Debug, Serialize)]
pub struct JoinWaitlistResponse {
    pub id: Uuid,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

async fn join_waitlist(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<JoinWaitlistRequest>,
) -> Result<(StatusCode, Json<JoinWaitlistResponse>)> {
    let user_id = caller.user_id.ok_or(AppError::Unauthenticated)?;

    let entry = bounded(
        &state,
        waitlist::enroll(&state.pool, event_id, user_id, req.requested_seats),
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(JoinWaitlistResponse {
            id: entry.id,
            position: entry.position,
            created_at: entry.created_at,
        }),
    ))
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/events/:id/waitlist", post(join_waitlist))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
