use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum HoldStatus {
    Active,
    Expired,
    Converted,
}

/// Durable record of a hold. Its `expires_at` is the authoritative TTL the
/// expiry worker acts on; the per-seat `hold_expires_at` is a denormalized
/// copy for seat-level reads.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SeatHold {
    pub id: Uuid,
    pub hold_token: String,
    pub event_id: Uuid,
    pub user_id: Option<Uuid>,
    pub seat_ids: Vec<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub status: HoldStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SeatHold {
    pub async fn insert(
        db: impl sqlx::PgExecutor<'_>,
        hold_token: &str,
        event_id: Uuid,
        user_id: Option<Uuid>,
        seat_ids: &[Uuid],
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO seat_holds (hold_token, event_id, user_id, seat_ids, expires_at, status)
            VALUES ($1, $2, $3, $4, $5, 'active')
            RETURNING *
            "#,
        )
        .bind(hold_token)
        .bind(event_id)
        .bind(user_id)
        .bind(seat_ids)
        .bind(expires_at)
        .fetch_one(db)
        .await
    }

    pub async fn lock_by_token(
        db: impl sqlx::PgExecutor<'_>,
        hold_token: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM seat_holds WHERE hold_token = $1 FOR UPDATE")
            .bind(hold_token)
            .fetch_optional(db)
            .await
    }

    /// Terminal transition used by booking conversion. Conditional on the
    /// hold still being active so a raced expiry never flips back.
    pub async fn mark_converted(
        db: impl sqlx::PgExecutor<'_>,
        hold_token: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE seat_holds
            SET status = 'converted', updated_at = now()
            WHERE hold_token = $1 AND status = 'active'
            "#,
        )
        .bind(hold_token)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn mark_expired(db: impl sqlx::PgExecutor<'_>, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE seat_holds
            SET status = 'expired', updated_at = now()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Non-locking scan used by the expiry worker.
    pub async fn list_expired(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM seat_holds
            WHERE expires_at <= now() AND status = 'active'
            ORDER BY created_at
            "#,
        )
        .fetch_all(pool)
        .await
    }
}
