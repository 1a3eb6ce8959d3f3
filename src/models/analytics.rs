//! Read-only aggregates for the admin analytics surface.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BookingTotals {
    pub total_bookings: i64,
    pub total_seats_booked: i64,
    pub total_cancellations: i64,
    pub total_active: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BookingsPerDay {
    pub day: DateTime<Utc>,
    pub bookings: i64,
    pub seats_booked: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TopEvent {
    pub event_id: Uuid,
    pub name: String,
    pub bookings: i64,
    pub seats_booked: i64,
    pub capacity: i32,
    pub booked_count: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventUtilization {
    pub event_id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub booked_count: i32,
    pub bookings_seats_in_range: i64,
}

pub async fn booking_totals(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<BookingTotals, sqlx::Error> {
    sqlx::query_as::<_, BookingTotals>(
        r#"
        SELECT COUNT(*)                                        AS total_bookings,
               COALESCE(SUM(seats), 0)::bigint                 AS total_seats_booked,
               COUNT(*) FILTER (WHERE status = 'cancelled')    AS total_cancellations,
               COUNT(*) FILTER (WHERE status = 'active')       AS total_active
        FROM bookings
        WHERE created_at >= $1 AND created_at <= $2
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await
}

pub async fn bookings_per_day(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<BookingsPerDay>, sqlx::Error> {
    sqlx::query_as::<_, BookingsPerDay>(
        r#"
        SELECT date_trunc('day', created_at)    AS day,
               COUNT(*)                         AS bookings,
               COALESCE(SUM(seats), 0)::bigint  AS seats_booked
        FROM bookings
        WHERE created_at >= $1 AND created_at <= $2
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

pub async fn top_events_by_seats(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<TopEvent>, sqlx::Error> {
    sqlx::query_as::<_, TopEvent>(
        r#"
        SELECT e.id                             AS event_id,
               e.name                           AS name,
               COUNT(b.id)                      AS bookings,
               COALESCE(SUM(b.seats), 0)::bigint AS seats_booked,
               e.capacity                       AS capacity,
               e.booked_count                   AS booked_count
        FROM events e
        JOIN bookings b ON b.event_id = e.id
        WHERE b.created_at >= $1 AND b.created_at <= $2 AND b.status = 'active'
        GROUP BY e.id
        ORDER BY seats_booked DESC
        LIMIT $3
        "#,
    )
    .bind(from)
    .bind(to)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Per-event fill picture: standing capacity/booked_count next to the
/// active-booking seats created inside the queried window.
pub async fn event_utilization(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<EventUtilization>, sqlx::Error> {
    sqlx::query_as::<_, EventUtilization>(
        r#"
        SELECT e.id                              AS event_id,
               e.name                            AS name,
               e.capacity                        AS capacity,
               e.booked_count                    AS booked_count,
               COALESCE(SUM(b.seats), 0)::bigint AS bookings_seats_in_range
        FROM events e
        LEFT JOIN bookings b
            ON b.event_id = e.id
            AND b.created_at >= $1 AND b.created_at <= $2
            AND b.status = 'active'
        GROUP BY e.id
        ORDER BY bookings_seats_in_range DESC
        LIMIT $3
        "#,
    )
    .bind(from)
    .bind(to)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn bookings_by_status(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<StatusCount>, sqlx::Error> {
    sqlx::query_as::<_, StatusCount>(
        r#"
        SELECT status, COUNT(*) AS count
        FROM bookings
        WHERE created_at >= $1 AND created_at <= $2
        GROUP BY status
        ORDER BY status
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}
