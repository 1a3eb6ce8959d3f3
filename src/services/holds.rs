use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::seat::{Seat, SeatStatus};
use crate::models::SeatHold;
use crate::services::Caller;

#[derive(Debug, Clone, Serialize)]
pub struct HoldGrant {
    pub hold_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Drops empty entries and duplicates while preserving request order.
pub fn dedupe_seat_nos(seat_nos: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(seat_nos.len());
    seat_nos
        .iter()
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}

/// Requested seat numbers that did not resolve to rows.
pub fn missing_seat_nos(requested: &[String], resolved: &[Seat]) -> Vec<String> {
    let found: HashSet<&str> = resolved.iter().map(|s| s.seat_no.as_str()).collect();
    requested
        .iter()
        .filter(|no| !found.contains(no.as_str()))
        .cloned()
        .collect()
}

/// Places a TTL-bounded exclusive claim on a set of seats.
///
/// The seat rows are locked `FOR UPDATE` before any check, so two
/// concurrent holds over an overlapping seat set serialize and the loser
/// observes `held` seats. The durable `seat_holds` row is what the expiry
/// worker acts on.
pub async fn create_hold(
    pool: &PgPool,
    event_id: Uuid,
    seat_nos: &[String],
    caller: &Caller,
    ttl: Duration,
) -> Result<HoldGrant> {
    let seat_nos = dedupe_seat_nos(seat_nos);
    if seat_nos.is_empty() {
        return Err(AppError::InvalidRequest(
            "no valid seat numbers provided".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    let seats = Seat::lock_by_seat_nos(&mut *tx, event_id, &seat_nos).await?;

    if seats.len() != seat_nos.len() {
        return Err(AppError::SeatsNotFound(missing_seat_nos(&seat_nos, &seats)));
    }

    if let Some(taken) = seats.iter().find(|s| s.status != SeatStatus::Available) {
        return Err(AppError::SeatsUnavailable {
            seat_no: taken.seat_no.clone(),
            status: taken.status.to_string(),
        });
    }

    let seat_ids: Vec<Uuid> = seats.iter().map(|s| s.id).collect();
    let hold_token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);

    Seat::mark_held(&mut *tx, &seat_ids, &hold_token, expires_at).await?;

    let hold = SeatHold::insert(
        &mut *tx,
        &hold_token,
        event_id,
        caller.user_id,
        &seat_ids,
        expires_at,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        event_id = %event_id,
        hold_id = %hold.id,
        seats = seat_ids.len(),
        expires_at = %hold.expires_at,
        "hold created"
    );

    Ok(HoldGrant {
        hold_token: hold.hold_token,
        expires_at: hold.expires_at,
    })
}
