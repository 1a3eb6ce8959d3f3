// API module - HTTP endpoints

pub mod analytics;
pub mod bookings;
pub mod events;
pub mod health;
pub mod holds;
pub mod middleware;
pub mod seats;
pub mod users;
pub mod waitlist;

use std::future::Future;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::dispatch::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub notifier: Notifier,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.pool.clone()
    }
}

/// Bounds a service call by the configured request deadline. An elapsed
/// deadline drops the service future, which rolls back any transaction it
/// had open.
pub(crate) async fn bounded<F, T>(state: &AppState, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(state.config.request_timeout(), fut)
        .await
        .map_err(|_| AppError::Timeout)?
}
