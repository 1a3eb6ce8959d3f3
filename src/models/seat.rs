use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Held,
    Booked,
    Blocked,
}

impl std::fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SeatStatus::Available => "available",
            SeatStatus::Held => "held",
            SeatStatus::Booked => "booked",
            SeatStatus::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Seat {
    pub id: Uuid,
    pub event_id: Uuid,
    pub seat_no: String,
    pub status: SeatStatus,
    pub booking_id: Option<Uuid>,
    pub hold_token: Option<String>,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Seat {
    /// Resolve and exclusively lock the named seats of an event. Ascending id
    /// order is the crate-wide lock order for seat rows.
    pub async fn lock_by_seat_nos(
        db: impl sqlx::PgExecutor<'_>,
        event_id: Uuid,
        seat_nos: &[String],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM seats
            WHERE event_id = $1 AND seat_no = ANY($2)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(event_id)
        .bind(seat_nos)
        .fetch_all(db)
        .await
    }

    /// Lock the seats attached to a hold, ascending id order.
    pub async fn lock_by_hold_token(
        db: impl sqlx::PgExecutor<'_>,
        hold_token: &str,
        event_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM seats
            WHERE hold_token = $1 AND event_id = $2
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(hold_token)
        .bind(event_id)
        .fetch_all(db)
        .await
    }

    /// Lock specific seat rows by id without reading them back.
    pub async fn lock_ids(
        db: impl sqlx::PgExecutor<'_>,
        seat_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT id FROM seats WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(seat_ids)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Lock up to `limit` available seats of an event, ascending id order.
    pub async fn lock_available(
        db: impl sqlx::PgExecutor<'_>,
        event_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM seats
            WHERE event_id = $1 AND status = 'available'
            ORDER BY id
            LIMIT $2
            FOR UPDATE
            "#,
        )
        .bind(event_id)
        .bind(limit)
        .fetch_all(db)
        .await
    }

    pub async fn mark_held(
        db: impl sqlx::PgExecutor<'_>,
        seat_ids: &[Uuid],
        hold_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE seats
            SET status = 'held', hold_token = $1, hold_expires_at = $2, updated_at = now()
            WHERE id = ANY($3)
            "#,
        )
        .bind(hold_token)
        .bind(expires_at)
        .bind(seat_ids)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn mark_booked(
        db: impl sqlx::PgExecutor<'_>,
        seat_ids: &[Uuid],
        booking_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE seats
            SET status = 'booked', booking_id = $1,
                hold_token = NULL, hold_expires_at = NULL, updated_at = now()
            WHERE id = ANY($2)
            "#,
        )
        .bind(booking_id)
        .bind(seat_ids)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Free seats that still carry the given hold token. The token filter
    /// keeps a stale expiry run from clobbering a seat that was re-held.
    pub async fn release_by_hold(
        db: impl sqlx::PgExecutor<'_>,
        seat_ids: &[Uuid],
        hold_token: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET status = 'available', hold_token = NULL, hold_expires_at = NULL,
                updated_at = now()
            WHERE id = ANY($1) AND hold_token = $2
            "#,
        )
        .bind(seat_ids)
        .bind(hold_token)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Free booked seats on cancellation, clearing every claim field.
    pub async fn release_by_ids(
        db: impl sqlx::PgExecutor<'_>,
        seat_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE seats
            SET status = 'available', booking_id = NULL,
                hold_token = NULL, hold_expires_at = NULL, updated_at = now()
            WHERE id = ANY($1)
            "#,
        )
        .bind(seat_ids)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn list_by_event(pool: &PgPool, event_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM seats WHERE event_id = $1 ORDER BY seat_no")
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    /// Bulk-create seats; seat numbers that already exist are left untouched.
    pub async fn bulk_insert(
        pool: &PgPool,
        event_id: Uuid,
        seat_nos: &[String],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO seats (event_id, seat_no)
            SELECT $1::uuid, unnest($2::text[])
            ON CONFLICT (event_id, seat_no) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(event_id)
        .bind(seat_nos)
        .fetch_all(pool)
        .await
    }

    pub async fn seat_nos_by_ids(
        db: impl sqlx::PgExecutor<'_>,
        seat_ids: &[Uuid],
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT seat_no FROM seats WHERE id = ANY($1) ORDER BY seat_no")
                .bind(seat_ids)
                .fetch_all(db)
                .await?;
        Ok(rows.into_iter().map(|(no,)| no).collect())
    }
}
