//! Shared fixtures for the end-to-end scenarios. These tests need a live
//! Postgres; point DATABASE_URL at one and run with `cargo test -- --ignored`.

use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use boxoffice::models::event::CreateEventData;
use boxoffice::models::user::{Role, User};
use boxoffice::models::{Event, Seat};
use boxoffice::services::bookings::RetryPolicy;
use boxoffice::services::dispatch::Notifier;
use boxoffice::services::Caller;

pub async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must point at a Postgres instance for integration tests");
    let pool = boxoffice::db::create_pool(&url).await.expect("connect");
    boxoffice::db::run_migrations(&pool).await.expect("migrate");
    pool
}

pub fn notifier(pool: &PgPool) -> Notifier {
    // No SMTP in tests; deliveries degrade to log lines.
    Notifier::new(pool.clone(), None)
}

pub fn retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        initial_backoff: Duration::from_millis(100),
    }
}

pub async fn create_event(pool: &PgPool, capacity: i32) -> Event {
    Event::create(
        pool,
        CreateEventData {
            name: format!("event-{}", Uuid::new_v4()),
            venue: Some("Main Hall".into()),
            start_time: None,
            capacity,
            metadata: serde_json::json!({}),
        },
    )
    .await
    .expect("create event")
}

/// Seeds seats S1..Sn and returns their seat numbers.
pub async fn create_seats(pool: &PgPool, event_id: Uuid, n: usize) -> Vec<String> {
    let seat_nos: Vec<String> = (1..=n).map(|i| format!("S{i}")).collect();
    Seat::bulk_insert(pool, event_id, &seat_nos)
        .await
        .expect("seed seats");
    seat_nos
}

pub async fn create_user(pool: &PgPool, role: Role) -> User {
    // Minimum bcrypt cost keeps fixture setup fast.
    let hash = bcrypt::hash("password", 4).expect("hash");
    User::create(
        pool,
        "Test User",
        &format!("{}@example.com", Uuid::new_v4()),
        &hash,
        role,
    )
    .await
    .expect("create user")
}

pub fn caller_for(user: &User) -> Caller {
    Caller::new(Some(user.id), user.role)
}

pub async fn load_event(pool: &PgPool, id: Uuid) -> Event {
    Event::find_by_id(pool, id)
        .await
        .expect("query event")
        .expect("event exists")
}

pub async fn seat_by_no(pool: &PgPool, event_id: Uuid, seat_no: &str) -> Seat {
    Seat::list_by_event(pool, event_id)
        .await
        .expect("list seats")
        .into_iter()
        .find(|s| s.seat_no == seat_no)
        .expect("seat exists")
}
