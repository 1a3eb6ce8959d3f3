use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Cancelled,
    Expired,
    Failed,
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Active => "active",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
            BookingStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Option<Uuid>,
    pub seats: i32,
    pub seat_ids: Vec<Uuid>,
    pub status: BookingStatus,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub async fn insert(
        db: impl sqlx::PgExecutor<'_>,
        event_id: Uuid,
        user_id: Option<Uuid>,
        seat_ids: &[Uuid],
        idempotency_key: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO bookings (event_id, user_id, seats, seat_ids, status, idempotency_key)
            VALUES ($1, $2, $3, $4, 'active', $5)
            RETURNING *
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .bind(seat_ids.len() as i32)
        .bind(seat_ids)
        .bind(idempotency_key)
        .fetch_one(db)
        .await
    }

    pub async fn find_by_id(
        db: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_idempotency_key(
        db: impl sqlx::PgExecutor<'_>,
        event_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM bookings WHERE event_id = $1 AND idempotency_key = $2",
        )
        .bind(event_id)
        .bind(idempotency_key)
        .fetch_optional(db)
        .await
    }

    pub async fn lock_by_id(
        db: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Conditional flip to cancelled; zero affected rows means the booking
    /// was no longer active.
    pub async fn mark_cancelled(
        db: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled', updated_at = now()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
