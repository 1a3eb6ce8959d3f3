use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::middleware::auth::require_auth;
use crate::api::{bounded, AppState};
use crate::error::{AppError, Result};
use crate::services::bookings::{self, BookingView, CreateBookingOutcome, RetryPolicy};
use crate::services::Caller;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub event_id: Uuid,
    pub hold_token: String,
}

fn idempotency_key(headers: &HeaderMap) -> Result<String> {
    headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Idempotency-Key header required".into()))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingView>)> {
    let key = idempotency_key(&headers)?;
    let retry = RetryPolicy {
        attempts: state.config.booking_retry_attempts,
        initial_backoff: state.config.booking_initial_backoff(),
    };

    let outcome = bounded(
        &state,
        bookings::create_booking(
            &state.pool,
            &state.notifier,
            req.event_id,
            &req.hold_token,
            &key,
            &caller,
            retry,
        ),
    )
    .await?;

    Ok(match outcome {
        CreateBookingOutcome::Created(view) => (StatusCode::CREATED, Json(view)),
        CreateBookingOutcome::Replayed(view) => (StatusCode::OK, Json(view)),
    })
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingView>> {
    let view = bookings::get_booking(&state.pool, id, &caller).await?;
    Ok(Json(view))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<BookingView>>> {
    let user_id = caller.user_id.ok_or(AppError::Unauthenticated)?;
    let views = bookings::list_my_bookings(&state.pool, user_id).await?;
    Ok(Json(views))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingView>> {
    let view = bounded(
        &state,
        bookings::cancel_booking(&state.pool, &state.notifier, id, &caller),
    )
    .await?;
    Ok(Json(view))
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/me", get(my_bookings))
        .route("/bookings/:id", get(get_booking).delete(cancel_booking))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
