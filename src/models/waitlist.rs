use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum WaitlistStatus {
    Waiting,
    Notified,
    Promoted,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub requested_seats: i32,
    pub position: i64,
    pub status: WaitlistStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WaitlistEntry {
    /// Appends the user to the event's waitlist. The `(event_id, user_id)`
    /// unique constraint surfaces duplicates as a unique violation.
    pub async fn insert(
        pool: &PgPool,
        event_id: Uuid,
        user_id: Uuid,
        requested_seats: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO waitlist (event_id, user_id, requested_seats, position, status)
            VALUES (
                $1, $2, $3,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM waitlist WHERE event_id = $1),
                'waiting'
            )
            RETURNING *
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .bind(requested_seats)
        .fetch_one(pool)
        .await
    }

    /// Promotion order: position first, enrollment time as tiebreak.
    pub async fn list_waiting(
        db: impl sqlx::PgExecutor<'_>,
        event_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM waitlist
            WHERE event_id = $1 AND status = 'waiting'
            ORDER BY position, created_at
            "#,
        )
        .bind(event_id)
        .fetch_all(db)
        .await
    }

    pub async fn mark_promoted(db: impl sqlx::PgExecutor<'_>, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE waitlist
            SET status = 'promoted', updated_at = now()
            WHERE id = $1 AND status = 'waiting'
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }
}
