use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, Result};
use crate::models::seat::Seat;
use crate::models::{Booking, Event, WaitlistEntry};
use crate::services::dispatch::Notifier;

/// Appends a user to an event's waitlist. One entry per `(event, user)`;
/// the unique constraint is the authoritative guard against doubles.
pub async fn enroll(
    pool: &PgPool,
    event_id: Uuid,
    user_id: Uuid,
    requested_seats: i32,
) -> Result<WaitlistEntry> {
    if requested_seats < 1 {
        return Err(AppError::InvalidRequest(
            "requested_seats must be at least 1".into(),
        ));
    }

    Event::find_by_id(pool, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("event".into()))?;

    match WaitlistEntry::insert(pool, event_id, user_id, requested_seats).await {
        Ok(entry) => {
            tracing::info!(
                event_id = %event_id,
                user_id = %user_id,
                position = entry.position,
                "joined waitlist"
            );
            Ok(entry)
        }
        Err(e) if db::is_unique_violation(&e) => Err(AppError::AlreadyOnWaitlist),
        Err(e) => Err(e.into()),
    }
}

/// Promotes waiting entries for an event in strict `(position, created_at)`
/// order, one short transaction per candidate.
///
/// The scan stops at the first candidate that cannot be fully seated:
/// skipping ahead to smaller requests would silently reorder the queue, so
/// head-of-line blocking is the intended semantic. Returns the number of
/// entries promoted.
pub async fn promote_event(pool: &PgPool, notifier: &Notifier, event_id: Uuid) -> Result<u32> {
    let waiters = WaitlistEntry::list_waiting(pool, event_id).await?;
    if waiters.is_empty() {
        return Ok(0);
    }

    let mut promoted = 0u32;
    for candidate in waiters {
        match promote_candidate(pool, &candidate).await {
            Ok(Some((booking, seat_nos))) => {
                promoted += 1;
                notifier.waitlist_promoted(&booking, seat_nos);
            }
            Ok(None) => {
                tracing::debug!(
                    event_id = %event_id,
                    entry_id = %candidate.id,
                    requested = candidate.requested_seats,
                    "not enough free seats for head of waitlist, stopping scan"
                );
                break;
            }
            Err(e) => {
                tracing::warn!(
                    event_id = %event_id,
                    entry_id = %candidate.id,
                    error = %e,
                    "waitlist promotion failed, aborting scan"
                );
                break;
            }
        }
    }

    if promoted > 0 {
        tracing::info!(event_id = %event_id, promoted, "waitlist promotion pass finished");
    }
    Ok(promoted)
}

/// One candidate, one transaction. `None` means the event does not have
/// enough free seats; the open transaction is dropped and rolls back.
async fn promote_candidate(
    pool: &PgPool,
    entry: &WaitlistEntry,
) -> Result<Option<(Booking, Vec<String>)>> {
    let mut tx = pool.begin().await?;

    let seats = Seat::lock_available(&mut *tx, entry.event_id, entry.requested_seats as i64).await?;
    if (seats.len() as i32) < entry.requested_seats {
        return Ok(None);
    }

    let seat_ids: Vec<Uuid> = seats.iter().map(|s| s.id).collect();
    let seat_nos: Vec<String> = seats.iter().map(|s| s.seat_no.clone()).collect();

    // Promotions are system-initiated; mint a fresh idempotency key so the
    // booking row satisfies the same uniqueness scheme as client bookings.
    let idempotency_key = Uuid::new_v4().to_string();

    let booking = Booking::insert(
        &mut *tx,
        entry.event_id,
        Some(entry.user_id),
        &seat_ids,
        &idempotency_key,
    )
    .await?;

    Seat::mark_booked(&mut *tx, &seat_ids, booking.id).await?;

    let updated =
        Event::increment_booked_guarded(&mut *tx, entry.event_id, seat_ids.len() as i32).await?;
    if updated == 0 {
        return Err(AppError::CapacityExceeded);
    }

    WaitlistEntry::mark_promoted(&mut *tx, entry.id).await?;

    tx.commit().await?;

    tracing::info!(
        event_id = %entry.event_id,
        user_id = %entry.user_id,
        booking_id = %booking.id,
        seats = booking.seats,
        "waitlist entry promoted"
    );

    Ok(Some((booking, seat_nos)))
}

/// Fire-and-forget promotion trigger, used after cancellations and hold
/// expiry. Never blocks the committing caller.
pub fn spawn_promotion(pool: PgPool, notifier: Notifier, event_id: Uuid) {
    tokio::spawn(async move {
        if let Err(e) = promote_event(&pool, &notifier, event_id).await {
            tracing::warn!(event_id = %event_id, error = %e, "waitlist promotion run failed");
        }
    });
}
