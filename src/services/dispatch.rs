//! Post-commit side effects. Everything here runs on spawned tasks after
//! the owning transaction has committed; failures are logged, never
//! surfaced, and never delay the caller.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Booking, Event, User};
use crate::services::mailer::Mailer;

#[derive(Clone)]
pub struct Notifier {
    pool: PgPool,
    mailer: Option<Arc<Mailer>>,
}

impl Notifier {
    pub fn new(pool: PgPool, mailer: Option<Arc<Mailer>>) -> Self {
        Self { pool, mailer }
    }

    /// Confirmation mail for a freshly committed booking.
    pub fn booking_confirmed(&self, booking: &Booking, seat_nos: Vec<String>) {
        self.send_ticket_mail(booking.clone(), seat_nos, MailKind::Confirmation);
    }

    /// Notice for a waitlist entry promoted into a booking.
    pub fn waitlist_promoted(&self, booking: &Booking, seat_nos: Vec<String>) {
        self.send_ticket_mail(booking.clone(), seat_nos, MailKind::Promotion);
    }

    fn send_ticket_mail(&self, booking: Booking, seat_nos: Vec<String>, kind: MailKind) {
        let Some(user_id) = booking.user_id else {
            tracing::debug!(booking_id = %booking.id, "anonymous booking, no notification");
            return;
        };

        let pool = self.pool.clone();
        let mailer = self.mailer.clone();

        tokio::spawn(async move {
            if let Err(e) = deliver(pool, mailer, user_id, booking, seat_nos, kind).await {
                tracing::warn!(error = %e, "notification delivery failed");
            }
        });
    }
}

#[derive(Clone, Copy, Debug)]
enum MailKind {
    Confirmation,
    Promotion,
}

async fn deliver(
    pool: PgPool,
    mailer: Option<Arc<Mailer>>,
    user_id: Uuid,
    booking: Booking,
    seat_nos: Vec<String>,
    kind: MailKind,
) -> anyhow::Result<()> {
    let user = User::find_by_id(&pool, user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {user_id} not found"))?;
    let event = Event::find_by_id(&pool, booking.event_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("event {} not found", booking.event_id))?;

    let Some(mailer) = mailer else {
        tracing::info!(
            booking_id = %booking.id,
            user_id = %user.id,
            event_id = %event.id,
            seats = ?seat_nos,
            kind = ?kind,
            "SMTP not configured, logging notification instead"
        );
        return Ok(());
    };

    // lettre's SMTP transport is blocking; keep it off the runtime threads.
    tokio::task::spawn_blocking(move || match kind {
        MailKind::Confirmation => mailer.send_booking_confirmation(
            &user.email,
            &event.name,
            event.venue.as_deref(),
            event.start_time,
            booking.id,
            &seat_nos,
        ),
        MailKind::Promotion => {
            mailer.send_promotion_notice(&user.email, &event.name, booking.id, &seat_nos)
        }
    })
    .await??;

    tracing::info!(booking_id = %booking.id, user_id = %user_id, kind = ?kind, "notification sent");
    Ok(())
}
