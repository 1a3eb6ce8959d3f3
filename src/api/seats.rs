use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::middleware::auth::{require_admin, require_auth};
use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::seat::{Seat, SeatStatus};

const MAX_BULK_SEATS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct BulkCreateSeatsRequest {
    pub seat_nos: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SeatResponse {
    pub seat_no: String,
    pub status: SeatStatus,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Seat> for SeatResponse {
    fn from(seat: Seat) -> Self {
        Self {
            seat_no: seat.seat_no,
            status: seat.status,
            booking_id: seat.booking_id,
            created_at: seat.created_at,
            updated_at: seat.updated_at,
        }
    }
}

async fn list_seats(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<SeatResponse>>> {
    let seats = Seat::list_by_event(&state.pool, event_id).await?;
    Ok(Json(seats.into_iter().map(SeatResponse::from).collect()))
}

async fn bulk_create_seats(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<BulkCreateSeatsRequest>,
) -> Result<(StatusCode, Json<Vec<SeatResponse>>)> {
    if req.seat_nos.is_empty() {
        return Err(AppError::InvalidRequest("seat_nos is required".into()));
    }
    if req.seat_nos.len() > MAX_BULK_SEATS {
        return Err(AppError::InvalidRequest(format!(
            "too many seats in a single request (max {MAX_BULK_SEATS})"
        )));
    }

    let inserted = Seat::bulk_insert(&state.pool, event_id, &req.seat_nos).await?;

    tracing::info!(event_id = %event_id, created = inserted.len(), "seats created");

    Ok((
        StatusCode::CREATED,
        Json(inserted.into_iter().map(SeatResponse::from).collect()),
    ))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/events/:id/seats", axum::routing::post(bulk_create_seats))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/events/:id/seats", get(list_seats))
        .merge(admin)
}
