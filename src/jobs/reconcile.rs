use std::time::Duration;

use sqlx::{FromRow, PgPool};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Event;

#[derive(Debug, Default)]
pub struct ReconcileStats {
    pub counts_fixed: usize,
    pub orphans_fixed: usize,
}

pub async fn run(pool: PgPool, tick: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(tick_secs = tick.as_secs(), "reconcile worker started");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match reconcile(&pool, &shutdown).await {
                    Ok(stats) if stats.counts_fixed > 0 || stats.orphans_fixed > 0 => {
                        tracing::info!(
                            counts_fixed = stats.counts_fixed,
                            orphans_fixed = stats.orphans_fixed,
                            "reconcile pass repaired drift"
                        );
                    }
                    Ok(_) => tracing::debug!("reconcile pass found no drift"),
                    Err(e) => tracing::error!(error = %e, "reconcile pass failed"),
                }
            }
            _ = shutdown.changed() => {
                tracing::info!("reconcile worker stopping");
                return;
            }
        }
    }
}

/// Belt-and-suspenders repair for drift introduced by partial failures or
/// operational edits: per-event booked_count vs the active-booking
/// aggregate, and booked seats whose booking is gone or inactive.
pub async fn reconcile(pool: &PgPool, shutdown: &watch::Receiver<bool>) -> Result<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    stats.counts_fixed = reconcile_event_counts(pool, shutdown).await?;
    stats.orphans_fixed = reconcile_orphan_seats(pool, shutdown).await?;
    Ok(stats)
}

#[derive(Debug, FromRow)]
struct CountDrift {
    event_id: Uuid,
    booked_count: i32,
    actual: i64,
}

async fn reconcile_event_counts(
    pool: &PgPool,
    shutdown: &watch::Receiver<bool>,
) -> Result<usize> {
    let drifted = sqlx::query_as::<_, CountDrift>(
        r#"
        SELECT e.id AS event_id, e.booked_count, COALESCE(b.cnt, 0) AS actual
        FROM events e
        LEFT JOIN (
            SELECT event_id, SUM(seats) AS cnt
            FROM bookings
            WHERE status = 'active'
            GROUP BY event_id
        ) b ON e.id = b.event_id
        WHERE e.booked_count IS DISTINCT FROM COALESCE(b.cnt, 0)
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut fixed = 0;
    for drift in drifted {
        if *shutdown.borrow() {
            break;
        }
        let result = sqlx::query(
            "UPDATE events SET booked_count = $1, updated_at = now() WHERE id = $2",
        )
        .bind(drift.actual as i32)
        .bind(drift.event_id)
        .execute(pool)
        .await;

        match result {
            Ok(_) => {
                fixed += 1;
                tracing::warn!(
                    event_id = %drift.event_id,
                    before = drift.booked_count,
                    after = drift.actual,
                    "repaired booked_count drift"
                );
            }
            Err(e) => {
                tracing::error!(event_id = %drift.event_id, error = %e, "failed to fix booked_count");
            }
        }
    }
    Ok(fixed)
}

#[derive(Debug, FromRow)]
struct OrphanSeat {
    seat_id: Uuid,
    event_id: Uuid,
}

async fn reconcile_orphan_seats(
    pool: &PgPool,
    shutdown: &watch::Receiver<bool>,
) -> Result<usize> {
    let orphans = sqlx::query_as::<_, OrphanSeat>(
        r#"
        SELECT s.id AS seat_id, s.event_id
        FROM seats s
        LEFT JOIN bookings b ON s.booking_id = b.id
        WHERE s.status = 'booked' AND (b.id IS NULL OR b.status <> 'active')
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut fixed = 0;
    for orphan in orphans {
        if *shutdown.borrow() {
            break;
        }
        match fix_orphan_seat(pool, &orphan).await {
            Ok(()) => {
                fixed += 1;
                tracing::warn!(
                    seat_id = %orphan.seat_id,
                    event_id = %orphan.event_id,
                    "repaired orphan booked seat"
                );
            }
            Err(e) => {
                tracing::error!(seat_id = %orphan.seat_id, error = %e, "failed to fix orphan seat");
            }
        }
    }
    Ok(fixed)
}

async fn fix_orphan_seat(pool: &PgPool, orphan: &OrphanSeat) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE seats
        SET status = 'available', booking_id = NULL, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(orphan.seat_id)
    .execute(&mut *tx)
    .await?;

    Event::decrement_booked_clamped(&mut *tx, orphan.event_id, 1).await?;

    tx.commit().await?;
    Ok(())
}
