use std::collections::BTreeSet;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::Result;
use crate::models::seat::Seat;
use crate::models::SeatHold;
use crate::services::dispatch::Notifier;
use crate::services::waitlist;

#[derive(Debug, Default)]
pub struct ExpiryStats {
    pub expired: usize,
    pub failed: usize,
    pub events_promoted: usize,
}

pub async fn run(
    pool: PgPool,
    notifier: Notifier,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(tick_secs = tick.as_secs(), "hold expiry worker started");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match expire_due_holds(&pool, &notifier, &shutdown).await {
                    Ok(stats) if stats.expired > 0 || stats.failed > 0 => {
                        tracing::info!(
                            expired = stats.expired,
                            failed = stats.failed,
                            events_promoted = stats.events_promoted,
                            "hold expiry pass finished"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "hold expiry pass failed"),
                }
            }
            _ = shutdown.changed() => {
                tracing::info!("hold expiry worker stopping");
                return;
            }
        }
    }
}

/// Expires every active hold whose TTL elapsed, one short transaction per
/// hold, then runs waitlist promotion once per touched event. A failure on
/// one hold is logged and skipped; the loop continues.
pub async fn expire_due_holds(
    pool: &PgPool,
    notifier: &Notifier,
    shutdown: &watch::Receiver<bool>,
) -> Result<ExpiryStats> {
    let holds = SeatHold::list_expired(pool).await?;
    let mut stats = ExpiryStats::default();
    if holds.is_empty() {
        return Ok(stats);
    }

    let mut touched_events: BTreeSet<Uuid> = BTreeSet::new();

    for hold in holds {
        if *shutdown.borrow() {
            break;
        }
        match expire_single_hold(pool, &hold).await {
            Ok(()) => {
                stats.expired += 1;
                touched_events.insert(hold.event_id);
            }
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(hold_id = %hold.id, error = %e, "failed to expire hold");
            }
        }
    }

    // Freed seats may unblock waiters; promote sequentially per event.
    for event_id in touched_events {
        if *shutdown.borrow() {
            break;
        }
        match waitlist::promote_event(pool, notifier, event_id).await {
            Ok(_) => stats.events_promoted += 1,
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "post-expiry promotion failed");
            }
        }
    }

    Ok(stats)
}

async fn expire_single_hold(pool: &PgPool, hold: &SeatHold) -> Result<()> {
    let mut tx = pool.begin().await?;

    Seat::lock_ids(&mut *tx, &hold.seat_ids).await?;

    // The token filter skips seats that were already re-held or booked.
    let freed = Seat::release_by_hold(&mut *tx, &hold.seat_ids, &hold.hold_token).await?;
    SeatHold::mark_expired(&mut *tx, hold.id).await?;

    tx.commit().await?;

    tracing::info!(
        hold_id = %hold.id,
        event_id = %hold.event_id,
        freed,
        "hold expired, seats freed"
    );
    Ok(())
}
