use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::api::middleware::auth::{require_admin, require_auth};
use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::event::{CreateEventData, Event};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub venue: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub capacity: i32,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub venue: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub name: String,
    pub venue: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub capacity: i32,
    pub booked_count: i32,
    pub available: i32,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        let available = event.available();
        Self {
            id: event.id,
            name: event.name,
            venue: event.venue,
            start_time: event.start_time,
            capacity: event.capacity,
            booked_count: event.booked_count,
            available,
            metadata: event.metadata,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>)> {
    if req.name.trim().is_empty() {
        return Err(AppError::InvalidRequest("name is required".into()));
    }
    if req.capacity < 0 {
        return Err(AppError::InvalidRequest(
            "capacity must be non-negative".into(),
        ));
    }

    let event = Event::create(
        &state.pool,
        CreateEventData {
            name: req.name,
            venue: req.venue,
            start_time: req.start_time,
            capacity: req.capacity,
            metadata: req.metadata.unwrap_or_else(|| JsonValue::Object(Default::default())),
        },
    )
    .await?;

    tracing::info!(event_id = %event.id, capacity = event.capacity, "event created");

    Ok((StatusCode::CREATED, Json(event.into())))
}

async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListEventsQuery>,
) -> Result<Json<Vec<EventResponse>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if limit <= 0 {
        return Err(AppError::InvalidRequest(
            "limit must be a positive integer".into(),
        ));
    }
    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(AppError::InvalidRequest(
            "offset must be non-negative".into(),
        ));
    }

    let events = Event::list(&state.pool, limit.min(MAX_LIMIT), offset).await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventResponse>> {
    let event = Event::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("event".into()))?;
    Ok(Json(event.into()))
}

async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Json<EventResponse>> {
    let existing = Event::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("event".into()))?;

    let capacity = req.capacity.unwrap_or(existing.capacity);
    if capacity < existing.booked_count {
        return Err(AppError::Conflict(format!(
            "capacity cannot be less than booked_count ({})",
            existing.booked_count
        )));
    }

    let updated = Event::update(
        &state.pool,
        id,
        req.name.unwrap_or(existing.name),
        req.venue.or(existing.venue),
        req.start_time.or(existing.start_time),
        capacity,
        req.metadata.unwrap_or(existing.metadata),
    )
    .await?
    // Raced with new bookings pushing booked_count past the new capacity.
    .ok_or_else(|| AppError::Conflict("capacity cannot be less than booked_count".into()))?;

    tracing::info!(event_id = %updated.id, "event updated");

    Ok(Json(updated.into()))
}

async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let deleted = Event::delete(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("event".into()))?;

    tracing::info!(event_id = %deleted, "event deleted");

    Ok(Json(serde_json::json!({ "id": deleted, "deleted": true })))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/events", post(create_event))
        .route("/events/:id", axum::routing::put(update_event).delete(delete_event))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let public = Router::new()
        .route("/events", get(list_events))
        .route("/events/:id", get(get_event));

    public.merge(admin)
}
