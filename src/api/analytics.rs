use axum::{
    extract::{Query, State},
    middleware,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::auth::{require_admin, require_auth};
use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::analytics::{
    self, BookingTotals, BookingsPerDay, EventUtilization, StatusCount, TopEvent,
};

const DEFAULT_RANGE_DAYS: i64 = 30;
const DEFAULT_TOP_N: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub top_n: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub range: TimeRange,
    pub totals: BookingTotals,
    pub by_day: Vec<BookingsPerDay>,
    pub top_events: Vec<TopEvent>,
    pub by_status: Vec<StatusCount>,
    pub event_utilization: Vec<EventUtilization>,
}

/// Accepts an RFC 3339 datetime or a date-only `YYYY-MM-DD` (taken as start
/// of day UTC).
fn parse_date_or_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(d) = s.parse::<NaiveDate>() {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

async fn booking_analytics(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>> {
    let now = Utc::now();

    let to = match &params.to {
        Some(s) => parse_date_or_datetime(s)
            .ok_or_else(|| AppError::InvalidRequest("invalid 'to' parameter".into()))?,
        None => now,
    };
    let from = match &params.from {
        Some(s) => parse_date_or_datetime(s)
            .ok_or_else(|| AppError::InvalidRequest("invalid 'from' parameter".into()))?,
        None => now - Duration::days(DEFAULT_RANGE_DAYS),
    };
    if from > to {
        return Err(AppError::InvalidRequest("'from' is after 'to'".into()));
    }

    let top_n = match params.top_n {
        Some(n) if n > 0 => n,
        Some(_) => return Err(AppError::InvalidRequest("top_n must be positive".into())),
        None => DEFAULT_TOP_N,
    };

    let totals = analytics::booking_totals(&state.pool, from, to).await?;
    let by_day = analytics::bookings_per_day(&state.pool, from, to).await?;
    let top_events = analytics::top_events_by_seats(&state.pool, from, to, top_n).await?;
    let by_status = analytics::bookings_by_status(&state.pool, from, to).await?;
    let event_utilization = analytics::event_utilization(&state.pool, from, to, top_n).await?;

    Ok(Json(AnalyticsResponse {
        range: TimeRange { from, to },
        totals,
        by_day,
        top_events,
        by_status,
        event_utilization,
    }))
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/analytics/bookings", get(booking_analytics))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339() {
        let t = parse_date_or_datetime("2026-03-01T12:30:00Z").unwrap();
        assert_eq!(t.to_rfc3339(), "2026-03-01T12:30:00+00:00");
    }

    #[test]
    fn parses_date_only_as_start_of_day() {
        let t = parse_date_or_datetime("2026-03-01").unwrap();
        assert_eq!(t.to_rfc3339(), "2026-03-01T00:00:00+00:00");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_date_or_datetime("next tuesday").is_none());
    }
}
