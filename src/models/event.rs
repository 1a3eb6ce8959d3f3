use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub venue: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub capacity: i32,
    pub booked_count: i32,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateEventData {
    pub name: String,
    pub venue: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub capacity: i32,
    pub metadata: JsonValue,
}

impl Event {
    pub async fn create(pool: &PgPool, data: CreateEventData) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO events (name, venue, start_time, capacity, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.venue)
        .bind(data.start_time)
        .bind(data.capacity)
        .bind(&data.metadata)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        db: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM events
            ORDER BY start_time NULLS LAST, created_at
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Full-row update. Refuses to shrink capacity below the current
    /// booked_count; returns None in that case (and when the event is gone).
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        name: String,
        venue: Option<String>,
        start_time: Option<DateTime<Utc>>,
        capacity: i32,
        metadata: JsonValue,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE events
            SET name = $2, venue = $3, start_time = $4, capacity = $5,
                metadata = $6, updated_at = now()
            WHERE id = $1 AND booked_count <= $5
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(venue)
        .bind(start_time)
        .bind(capacity)
        .bind(metadata)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        let row: Option<(Uuid,)> = sqlx::query_as("DELETE FROM events WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Guarded increment of booked_count. The WHERE clause refuses any
    /// update that would push booked_count past capacity; callers treat
    /// zero affected rows as a capacity failure.
    pub async fn increment_booked_guarded(
        db: impl sqlx::PgExecutor<'_>,
        event_id: Uuid,
        n: i32,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET booked_count = booked_count + $1, updated_at = now()
            WHERE id = $2 AND booked_count + $1 <= capacity
            "#,
        )
        .bind(n)
        .bind(event_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Clamped decrement; reconciliation repairs any remaining drift.
    pub async fn decrement_booked_clamped(
        db: impl sqlx::PgExecutor<'_>,
        event_id: Uuid,
        n: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE events
            SET booked_count = GREATEST(0, booked_count - $1), updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(n)
        .bind(event_id)
        .execute(db)
        .await?;
        Ok(())
    }

    pub fn available(&self) -> i32 {
        self.capacity - self.booked_count
    }
}
