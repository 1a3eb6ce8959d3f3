use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, Result};
use crate::models::booking::BookingStatus;
use crate::models::hold::HoldStatus;
use crate::models::seat::{Seat, SeatStatus};
use crate::models::{Booking, Event, SeatHold};
use crate::services::dispatch::Notifier;
use crate::services::{waitlist, Caller};

#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    pub id: Uuid,
    pub event_id: Uuid,
    pub seats: i32,
    pub seat_nos: Vec<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Replays are distinguished so the API layer can answer 200 instead of 201.
#[derive(Debug)]
pub enum CreateBookingOutcome {
    Created(BookingView),
    Replayed(BookingView),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

fn view_from(booking: Booking, seat_nos: Vec<String>) -> BookingView {
    BookingView {
        id: booking.id,
        event_id: booking.event_id,
        seats: booking.seats,
        seat_nos,
        status: booking.status,
        created_at: booking.created_at,
        updated_at: booking.updated_at,
    }
}

/// Checks a locked hold against the conversion preconditions: active,
/// unexpired, same event, and claimable by the caller. Anonymous holds are
/// the operator-override path and only an admin may claim them.
pub(crate) fn validate_hold(
    hold: &SeatHold,
    event_id: Uuid,
    caller: &Caller,
    now: DateTime<Utc>,
) -> Result<()> {
    if hold.status != HoldStatus::Active {
        return Err(AppError::HoldInvalid("hold is not active".into()));
    }
    if hold.expires_at <= now {
        return Err(AppError::HoldExpired);
    }
    if hold.event_id != event_id {
        return Err(AppError::HoldInvalid(
            "hold belongs to a different event".into(),
        ));
    }
    match hold.user_id {
        Some(owner) => {
            if caller.user_id != Some(owner) {
                return Err(AppError::HoldForeign);
            }
        }
        None => {
            if !caller.is_admin() {
                return Err(AppError::HoldForeign);
            }
        }
    }
    Ok(())
}

fn is_transient(err: &AppError) -> bool {
    matches!(err, AppError::Database(e) if db::is_transient(e))
}

enum TxOutcome {
    Created(Booking),
    Replayed(Booking),
}

/// One conversion attempt in one transaction. Serialization and deadlock
/// failures bubble up as `Database` errors for the caller's retry loop.
async fn try_convert_hold(
    pool: &PgPool,
    event_id: Uuid,
    hold_token: &str,
    idempotency_key: &str,
    caller: &Caller,
) -> Result<TxOutcome> {
    let mut tx = pool.begin().await?;

    let hold = SeatHold::lock_by_token(&mut *tx, hold_token)
        .await?
        .ok_or_else(|| AppError::NotFound("hold".into()))?;
    validate_hold(&hold, event_id, caller, Utc::now())?;

    let seats = Seat::lock_by_hold_token(&mut *tx, hold_token, event_id).await?;
    if seats.is_empty() {
        return Err(AppError::HoldInvalid("no seats attached to hold".into()));
    }
    for seat in &seats {
        if seat.status != SeatStatus::Held || seat.hold_token.as_deref() != Some(hold_token) {
            return Err(AppError::HoldInvalid(format!(
                "seat {} is no longer held by this token",
                seat.seat_no
            )));
        }
    }

    let seat_ids: Vec<Uuid> = seats.iter().map(|s| s.id).collect();

    let booking =
        match Booking::insert(&mut *tx, event_id, caller.user_id, &seat_ids, idempotency_key).await
        {
            Ok(booking) => booking,
            Err(e) if db::is_unique_violation(&e) => {
                // Lost a race on the idempotency key; the winner's row is
                // authoritative. Roll back and compare against it.
                drop(tx);
                let existing = Booking::find_by_idempotency_key(pool, event_id, idempotency_key)
                    .await?
                    .ok_or(AppError::Database(e))?;
                if existing.seat_ids == seat_ids {
                    return Ok(TxOutcome::Replayed(existing));
                }
                return Err(AppError::IdempotencyCollision);
            }
            Err(e) => return Err(e.into()),
        };

    Seat::mark_booked(&mut *tx, &seat_ids, booking.id).await?;

    let updated = Event::increment_booked_guarded(&mut *tx, event_id, seat_ids.len() as i32).await?;
    if updated == 0 {
        return Err(AppError::CapacityExceeded);
    }

    SeatHold::mark_converted(&mut *tx, hold_token).await?;

    tx.commit().await?;
    Ok(TxOutcome::Created(booking))
}

/// Converts a hold into a booking.
///
/// The idempotency pre-check runs outside the transaction so replays never
/// contend for locks; the partial unique index on
/// `(event_id, idempotency_key)` is the authoritative guard underneath it.
pub async fn create_booking(
    pool: &PgPool,
    notifier: &Notifier,
    event_id: Uuid,
    hold_token: &str,
    idempotency_key: &str,
    caller: &Caller,
    retry: RetryPolicy,
) -> Result<CreateBookingOutcome> {
    if idempotency_key.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "Idempotency-Key header required".into(),
        ));
    }
    if hold_token.is_empty() {
        return Err(AppError::InvalidRequest("hold_token required".into()));
    }

    if let Some(existing) =
        Booking::find_by_idempotency_key(pool, event_id, idempotency_key).await?
    {
        let seat_nos = Seat::seat_nos_by_ids(pool, &existing.seat_ids).await?;
        tracing::info!(booking_id = %existing.id, "idempotent replay of existing booking");
        return Ok(CreateBookingOutcome::Replayed(view_from(existing, seat_nos)));
    }

    let mut backoff = retry.initial_backoff;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match try_convert_hold(pool, event_id, hold_token, idempotency_key, caller).await {
            Ok(TxOutcome::Created(booking)) => {
                let seat_nos = Seat::seat_nos_by_ids(pool, &booking.seat_ids).await?;
                tracing::info!(
                    booking_id = %booking.id,
                    event_id = %event_id,
                    seats = booking.seats,
                    "booking created"
                );
                notifier.booking_confirmed(&booking, seat_nos.clone());
                return Ok(CreateBookingOutcome::Created(view_from(booking, seat_nos)));
            }
            Ok(TxOutcome::Replayed(booking)) => {
                let seat_nos = Seat::seat_nos_by_ids(pool, &booking.seat_ids).await?;
                return Ok(CreateBookingOutcome::Replayed(view_from(booking, seat_nos)));
            }
            Err(e) if is_transient(&e) => {
                if attempt >= retry.attempts {
                    tracing::warn!(
                        event_id = %event_id,
                        attempts = attempt,
                        "booking retries exhausted on serialization conflicts"
                    );
                    return Err(AppError::ServiceBusy);
                }
                tracing::debug!(attempt, backoff_ms = backoff.as_millis() as u64, "transient conflict, retrying booking");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Cancels an active booking, frees its seats and schedules waitlist
/// promotion for the event after commit.
pub async fn cancel_booking(
    pool: &PgPool,
    notifier: &Notifier,
    booking_id: Uuid,
    caller: &Caller,
) -> Result<BookingView> {
    let mut tx = pool.begin().await?;

    let mut booking = Booking::lock_by_id(&mut *tx, booking_id)
        .await?
        .ok_or_else(|| AppError::NotFound("booking".into()))?;

    if !caller.owns_or_admin(booking.user_id) {
        return Err(AppError::Forbidden(
            "only the booking owner or an admin may cancel".into(),
        ));
    }

    if booking.status != BookingStatus::Active {
        return Err(AppError::NotCancellable(booking.status.to_string()));
    }

    let flipped = Booking::mark_cancelled(&mut *tx, booking_id).await?;
    if flipped == 0 {
        return Err(AppError::NotCancellable(booking.status.to_string()));
    }

    if !booking.seat_ids.is_empty() {
        Seat::lock_ids(&mut *tx, &booking.seat_ids).await?;
        Seat::release_by_ids(&mut *tx, &booking.seat_ids).await?;
        Event::decrement_booked_clamped(&mut *tx, booking.event_id, booking.seats).await?;
    }

    tx.commit().await?;

    tracing::info!(
        booking_id = %booking_id,
        event_id = %booking.event_id,
        seats = booking.seats,
        "booking cancelled"
    );

    waitlist::spawn_promotion(pool.clone(), notifier.clone(), booking.event_id);

    booking.status = BookingStatus::Cancelled;
    let seat_nos = Seat::seat_nos_by_ids(pool, &booking.seat_ids).await?;
    Ok(view_from(booking, seat_nos))
}

pub async fn get_booking(pool: &PgPool, booking_id: Uuid, caller: &Caller) -> Result<BookingView> {
    let booking = Booking::find_by_id(pool, booking_id)
        .await?
        .ok_or_else(|| AppError::NotFound("booking".into()))?;

    if booking.user_id.is_none() || booking.user_id != caller.user_id {
        return Err(AppError::Forbidden(
            "only the booking owner may view this booking".into(),
        ));
    }

    let seat_nos = Seat::seat_nos_by_ids(pool, &booking.seat_ids).await?;
    Ok(view_from(booking, seat_nos))
}

pub async fn list_my_bookings(pool: &PgPool, user_id: Uuid) -> Result<Vec<BookingView>> {
    let bookings = Booking::list_by_user(pool, user_id).await?;
    let mut views = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let seat_nos = Seat::seat_nos_by_ids(pool, &booking.seat_ids).await?;
        views.push(view_from(booking, seat_nos));
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    fn hold(user_id: Option<Uuid>, event_id: Uuid, expires_in_secs: i64) -> SeatHold {
        SeatHold {
            id: Uuid::new_v4(),
            hold_token: Uuid::new_v4().to_string(),
            event_id,
            user_id,
            seat_ids: vec![Uuid::new_v4()],
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_secs),
            status: HoldStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_may_convert_own_hold() {
        let event_id = Uuid::new_v4();
        let uid = Uuid::new_v4();
        let h = hold(Some(uid), event_id, 60);
        let caller = Caller::new(Some(uid), Role::User);
        assert!(validate_hold(&h, event_id, &caller, Utc::now()).is_ok());
    }

    #[test]
    fn foreign_hold_is_rejected() {
        let event_id = Uuid::new_v4();
        let h = hold(Some(Uuid::new_v4()), event_id, 60);
        let caller = Caller::new(Some(Uuid::new_v4()), Role::User);
        assert!(matches!(
            validate_hold(&h, event_id, &caller, Utc::now()),
            Err(AppError::HoldForeign)
        ));
    }

    #[test]
    fn anonymous_hold_claimable_by_admin_only() {
        let event_id = Uuid::new_v4();
        let h = hold(None, event_id, 60);

        let admin = Caller::new(Some(Uuid::new_v4()), Role::Admin);
        assert!(validate_hold(&h, event_id, &admin, Utc::now()).is_ok());

        let user = Caller::new(Some(Uuid::new_v4()), Role::User);
        assert!(matches!(
            validate_hold(&h, event_id, &user, Utc::now()),
            Err(AppError::HoldForeign)
        ));
    }

    #[test]
    fn expired_hold_is_rejected() {
        let event_id = Uuid::new_v4();
        let uid = Uuid::new_v4();
        let h = hold(Some(uid), event_id, -5);
        let caller = Caller::new(Some(uid), Role::User);
        assert!(matches!(
            validate_hold(&h, event_id, &caller, Utc::now()),
            Err(AppError::HoldExpired)
        ));
    }

    #[test]
    fn hold_for_another_event_is_rejected() {
        let uid = Uuid::new_v4();
        let h = hold(Some(uid), Uuid::new_v4(), 60);
        let caller = Caller::new(Some(uid), Role::User);
        assert!(matches!(
            validate_hold(&h, Uuid::new_v4(), &caller, Utc::now()),
            Err(AppError::HoldInvalid(_))
        ));
    }

    #[test]
    fn terminal_hold_is_rejected() {
        let event_id = Uuid::new_v4();
        let uid = Uuid::new_v4();
        let mut h = hold(Some(uid), event_id, 60);
        h.status = HoldStatus::Converted;
        let caller = Caller::new(Some(uid), Role::User);
        assert!(matches!(
            validate_hold(&h, event_id, &caller, Utc::now()),
            Err(AppError::HoldInvalid(_))
        ));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let mut backoff = Duration::from_millis(100);
        let mut observed = Vec::new();
        for _ in 0..3 {
            observed.push(backoff);
            backoff *= 2;
        }
        assert_eq!(
            observed,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
    }
}
