// Jobs module - periodic background workers

pub mod expire_holds;
pub mod reconcile;

use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::services::dispatch::Notifier;

/// Starts the hold-expiry and reconcile loops. Both stop cleanly when the
/// shutdown channel flips: they finish the in-flight item, then exit.
pub fn spawn_workers(
    pool: PgPool,
    notifier: Notifier,
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(expire_holds::run(
            pool.clone(),
            notifier,
            config.expiry_tick(),
            shutdown.clone(),
        )),
        tokio::spawn(reconcile::run(pool, config.reconcile_tick(), shutdown)),
    ]
}
