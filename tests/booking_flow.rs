//! End-to-end booking scenarios against a live Postgres.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

mod support;

use std::time::Duration;

use boxoffice::error::AppError;
use boxoffice::models::booking::BookingStatus;
use boxoffice::models::hold::HoldStatus;
use boxoffice::models::seat::SeatStatus;
use boxoffice::models::user::Role;
use boxoffice::models::SeatHold;
use boxoffice::services::bookings::{self, CreateBookingOutcome};
use boxoffice::services::holds;
use tokio::sync::watch;

fn created(outcome: CreateBookingOutcome) -> boxoffice::services::bookings::BookingView {
    match outcome {
        CreateBookingOutcome::Created(view) => view,
        CreateBookingOutcome::Replayed(view) => {
            panic!("expected a fresh booking, got replay of {}", view.id)
        }
    }
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn hold_then_book_happy_path() {
    let pool = support::test_pool().await;
    let notifier = support::notifier(&pool);

    let event = support::create_event(&pool, 10).await;
    support::create_seats(&pool, event.id, 10).await;

    let alice = support::create_user(&pool, Role::User).await;
    let alice_caller = support::caller_for(&alice);
    let bob = support::create_user(&pool, Role::User).await;
    let bob_caller = support::caller_for(&bob);

    let wanted = vec!["S1".to_string(), "S2".to_string(), "S3".to_string()];
    let grant = holds::create_hold(
        &pool,
        event.id,
        &wanted,
        &alice_caller,
        Duration::from_secs(300),
    )
    .await
    .expect("alice holds three seats");

    // Bob contends for a held seat and loses.
    let conflict = holds::create_hold(
        &pool,
        event.id,
        &["S2".to_string()],
        &bob_caller,
        Duration::from_secs(300),
    )
    .await;
    assert!(matches!(
        conflict,
        Err(AppError::SeatsUnavailable { ref seat_no, .. }) if seat_no == "S2"
    ));

    let view = created(
        bookings::create_booking(
            &pool,
            &notifier,
            event.id,
            &grant.hold_token,
            "K1",
            &alice_caller,
            support::retry(),
        )
        .await
        .expect("alice books her hold"),
    );

    assert_eq!(view.seats, 3);
    assert_eq!(view.seat_nos, wanted);
    assert_eq!(view.status, BookingStatus::Active);

    let event = support::load_event(&pool, event.id).await;
    assert_eq!(event.booked_count, 3);

    for no in ["S1", "S2", "S3"] {
        let seat = support::seat_by_no(&pool, event.id, no).await;
        assert_eq!(seat.status, SeatStatus::Booked);
        assert_eq!(seat.booking_id, Some(view.id));
        assert!(seat.hold_token.is_none());
    }

    let hold = SeatHold::lock_by_token(&pool, &grant.hold_token)
        .await
        .expect("query hold")
        .expect("hold row");
    assert_eq!(hold.status, HoldStatus::Converted);
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn idempotent_retry_returns_same_booking() {
    let pool = support::test_pool().await;
    let notifier = support::notifier(&pool);

    let event = support::create_event(&pool, 5).await;
    support::create_seats(&pool, event.id, 5).await;
    let alice = support::create_user(&pool, Role::User).await;
    let caller = support::caller_for(&alice);

    let grant = holds::create_hold(
        &pool,
        event.id,
        &["S1".to_string(), "S2".to_string()],
        &caller,
        Duration::from_secs(300),
    )
    .await
    .unwrap();

    let first = created(
        bookings::create_booking(
            &pool,
            &notifier,
            event.id,
            &grant.hold_token,
            "retry-key",
            &caller,
            support::retry(),
        )
        .await
        .unwrap(),
    );

    let second = bookings::create_booking(
        &pool,
        &notifier,
        event.id,
        &grant.hold_token,
        "retry-key",
        &caller,
        support::retry(),
    )
    .await
    .unwrap();

    let replayed = match second {
        CreateBookingOutcome::Replayed(view) => view,
        CreateBookingOutcome::Created(view) => panic!("duplicate booking {} created", view.id),
    };
    assert_eq!(replayed.id, first.id);
    assert_eq!(replayed.seat_nos, first.seat_nos);

    // State unchanged: still one booking's worth of seats.
    let event = support::load_event(&pool, event.id).await;
    assert_eq!(event.booked_count, 2);
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn expired_hold_frees_seats() {
    let pool = support::test_pool().await;
    let notifier = support::notifier(&pool);

    let event = support::create_event(&pool, 4).await;
    support::create_seats(&pool, event.id, 4).await;
    let carol = support::create_user(&pool, Role::User).await;
    let caller = support::caller_for(&carol);

    let grant = holds::create_hold(
        &pool,
        event.id,
        &["S4".to_string()],
        &caller,
        Duration::from_secs(1),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;

    let (_tx, shutdown) = watch::channel(false);
    let stats = boxoffice::jobs::expire_holds::expire_due_holds(&pool, &notifier, &shutdown)
        .await
        .expect("expiry pass");
    assert!(stats.expired >= 1);

    let seat = support::seat_by_no(&pool, event.id, "S4").await;
    assert_eq!(seat.status, SeatStatus::Available);
    assert!(seat.hold_token.is_none());
    assert!(seat.hold_expires_at.is_none());

    let hold = SeatHold::lock_by_token(&pool, &grant.hold_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hold.status, HoldStatus::Expired);
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn cancelled_seats_can_be_rebooked() {
    let pool = support::test_pool().await;
    let notifier = support::notifier(&pool);

    let event = support::create_event(&pool, 2).await;
    support::create_seats(&pool, event.id, 2).await;
    let user = support::create_user(&pool, Role::User).await;
    let caller = support::caller_for(&user);

    let grant = holds::create_hold(
        &pool,
        event.id,
        &["S1".to_string()],
        &caller,
        Duration::from_secs(300),
    )
    .await
    .unwrap();
    let booking = created(
        bookings::create_booking(
            &pool,
            &notifier,
            event.id,
            &grant.hold_token,
            "first",
            &caller,
            support::retry(),
        )
        .await
        .unwrap(),
    );

    let cancelled = bookings::cancel_booking(&pool, &notifier, booking.id, &caller)
        .await
        .expect("owner cancels");
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    let seat = support::seat_by_no(&pool, event.id, "S1").await;
    assert_eq!(seat.status, SeatStatus::Available);
    assert_eq!(support::load_event(&pool, event.id).await.booked_count, 0);

    // The same seat books again under a fresh hold and key.
    let regrant = holds::create_hold(
        &pool,
        event.id,
        &["S1".to_string()],
        &caller,
        Duration::from_secs(300),
    )
    .await
    .expect("seat holdable again");
    created(
        bookings::create_booking(
            &pool,
            &notifier,
            event.id,
            &regrant.hold_token,
            "second",
            &caller,
            support::retry(),
        )
        .await
        .expect("seat bookable again"),
    );
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn single_seat_is_never_sold_twice() {
    let pool = support::test_pool().await;
    let notifier = support::notifier(&pool);

    let event = support::create_event(&pool, 1).await;
    support::create_seats(&pool, event.id, 1).await;
    let a = support::create_user(&pool, Role::User).await;
    let b = support::create_user(&pool, Role::User).await;
    let caller_a = support::caller_for(&a);
    let caller_b = support::caller_for(&b);

    // Two concurrent claims on the single seat; the row lock serializes
    // them and exactly one hold wins.
    let seat = vec!["S1".to_string()];
    let (ra, rb) = tokio::join!(
        holds::create_hold(&pool, event.id, &seat, &caller_a, Duration::from_secs(300)),
        holds::create_hold(&pool, event.id, &seat, &caller_b, Duration::from_secs(300)),
    );

    let winners: Vec<_> = [ra.ok().map(|g| (g, caller_a)), rb.ok().map(|g| (g, caller_b))]
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(winners.len(), 1, "exactly one hold must win the seat");

    let (grant, winner) = winners.into_iter().next().unwrap();
    created(
        bookings::create_booking(
            &pool,
            &notifier,
            event.id,
            &grant.hold_token,
            "contended",
            &winner,
            support::retry(),
        )
        .await
        .expect("winner books"),
    );

    let event = support::load_event(&pool, event.id).await;
    assert_eq!(event.booked_count, 1);
    assert!(event.booked_count <= event.capacity);
}
