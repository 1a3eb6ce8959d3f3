//! Waitlist enrollment and FIFO promotion scenarios against a live Postgres.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

mod support;

use std::time::Duration;

use boxoffice::error::AppError;
use boxoffice::models::booking::BookingStatus;
use boxoffice::models::user::Role;
use boxoffice::models::waitlist::WaitlistStatus;
use boxoffice::models::{Booking, WaitlistEntry};
use boxoffice::services::bookings::{self, CreateBookingOutcome};
use boxoffice::services::{holds, waitlist};
use sqlx::PgPool;
use uuid::Uuid;

async fn book_seats(
    pool: &PgPool,
    event_id: Uuid,
    caller: &boxoffice::services::Caller,
    seat_nos: &[&str],
) -> boxoffice::services::bookings::BookingView {
    let notifier = support::notifier(pool);
    let seat_nos: Vec<String> = seat_nos.iter().map(|s| s.to_string()).collect();
    let grant = holds::create_hold(pool, event_id, &seat_nos, caller, Duration::from_secs(300))
        .await
        .expect("hold");
    match bookings::create_booking(
        pool,
        &notifier,
        event_id,
        &grant.hold_token,
        &Uuid::new_v4().to_string(),
        caller,
        support::retry(),
    )
    .await
    .expect("book")
    {
        CreateBookingOutcome::Created(view) => view,
        CreateBookingOutcome::Replayed(view) => view,
    }
}

async fn waitlist_entry(pool: &PgPool, event_id: Uuid, user_id: Uuid) -> WaitlistEntry {
    sqlx::query_as::<_, WaitlistEntry>(
        "SELECT * FROM waitlist WHERE event_id = $1 AND user_id = $2",
    )
    .bind(event_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("waitlist entry")
}

async fn active_bookings_for(pool: &PgPool, user_id: Uuid) -> Vec<Booking> {
    Booking::list_by_user(pool, user_id)
        .await
        .expect("bookings")
        .into_iter()
        .filter(|b| b.status == BookingStatus::Active)
        .collect()
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn duplicate_enrollment_is_rejected() {
    let pool = support::test_pool().await;
    let event = support::create_event(&pool, 1).await;
    support::create_seats(&pool, event.id, 1).await;
    let user = support::create_user(&pool, Role::User).await;

    waitlist::enroll(&pool, event.id, user.id, 1)
        .await
        .expect("first enrollment");
    let second = waitlist::enroll(&pool, event.id, user.id, 2).await;
    assert!(matches!(second, Err(AppError::AlreadyOnWaitlist)));
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn cancellation_promotes_the_waitlist() {
    let pool = support::test_pool().await;
    let notifier = support::notifier(&pool);

    let event = support::create_event(&pool, 2).await;
    support::create_seats(&pool, event.id, 2).await;

    let dan = support::create_user(&pool, Role::User).await;
    let eve = support::create_user(&pool, Role::User).await;
    let dan_caller = support::caller_for(&dan);

    // Dan books the event out.
    let booking = book_seats(&pool, event.id, &dan_caller, &["S1", "S2"]).await;
    assert_eq!(support::load_event(&pool, event.id).await.booked_count, 2);

    let entry = waitlist::enroll(&pool, event.id, eve.id, 1)
        .await
        .expect("eve joins the waitlist");
    assert_eq!(entry.position, 1);

    bookings::cancel_booking(&pool, &notifier, booking.id, &dan_caller)
        .await
        .expect("dan cancels");

    // Cancellation schedules promotion in the background; give it a beat,
    // then run an explicit pass (the protocol is conflict-safe).
    tokio::time::sleep(Duration::from_millis(300)).await;
    waitlist::promote_event(&pool, &notifier, event.id)
        .await
        .expect("promotion pass");

    let entry = waitlist_entry(&pool, event.id, eve.id).await;
    assert_eq!(entry.status, WaitlistStatus::Promoted);

    let eve_bookings = active_bookings_for(&pool, eve.id).await;
    assert_eq!(eve_bookings.len(), 1);
    assert_eq!(eve_bookings[0].seats, 1);

    assert_eq!(support::load_event(&pool, event.id).await.booked_count, 1);
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn promotion_is_strictly_fifo() {
    let pool = support::test_pool().await;
    let notifier = support::notifier(&pool);

    let event = support::create_event(&pool, 2).await;
    support::create_seats(&pool, event.id, 2).await;

    let dan = support::create_user(&pool, Role::User).await;
    let dan_caller = support::caller_for(&dan);
    let w1 = support::create_user(&pool, Role::User).await;
    let w2 = support::create_user(&pool, Role::User).await;
    let w3 = support::create_user(&pool, Role::User).await;

    // Sell out with two separate single-seat bookings so seats free one at
    // a time.
    let booking_a = book_seats(&pool, event.id, &dan_caller, &["S1"]).await;
    let booking_b = book_seats(&pool, event.id, &dan_caller, &["S2"]).await;

    waitlist::enroll(&pool, event.id, w1.id, 2).await.unwrap();
    waitlist::enroll(&pool, event.id, w2.id, 1).await.unwrap();
    waitlist::enroll(&pool, event.id, w3.id, 1).await.unwrap();

    // One seat frees. The head waiter needs two, and must not be skipped.
    bookings::cancel_booking(&pool, &notifier, booking_a.id, &dan_caller)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let promoted = waitlist::promote_event(&pool, &notifier, event.id)
        .await
        .unwrap();
    assert_eq!(promoted, 0, "head-of-line waiter must block smaller requests");

    for w in [&w1, &w2, &w3] {
        assert_eq!(
            waitlist_entry(&pool, event.id, w.id).await.status,
            WaitlistStatus::Waiting
        );
        assert!(active_bookings_for(&pool, w.id).await.is_empty());
    }

    // Second seat frees: now the head waiter gets both seats.
    bookings::cancel_booking(&pool, &notifier, booking_b.id, &dan_caller)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    waitlist::promote_event(&pool, &notifier, event.id)
        .await
        .unwrap();

    assert_eq!(
        waitlist_entry(&pool, event.id, w1.id).await.status,
        WaitlistStatus::Promoted
    );
    let w1_bookings = active_bookings_for(&pool, w1.id).await;
    assert_eq!(w1_bookings.len(), 1);
    assert_eq!(w1_bookings[0].seats, 2);

    // The smaller requests stay queued behind the promoted head.
    for w in [&w2, &w3] {
        assert_eq!(
            waitlist_entry(&pool, event.id, w.id).await.status,
            WaitlistStatus::Waiting
        );
    }

    let event = support::load_event(&pool, event.id).await;
    assert_eq!(event.booked_count, 2);
}
