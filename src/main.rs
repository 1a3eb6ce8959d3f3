use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boxoffice::api::{self, AppState};
use boxoffice::config::Config;
use boxoffice::services::dispatch::Notifier;
use boxoffice::services::mailer::Mailer;
use boxoffice::{db, jobs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxoffice=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting boxoffice server...");

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let mailer = match &config.smtp {
        Some(smtp) => Some(Arc::new(Mailer::from_config(smtp)?)),
        None => {
            tracing::warn!("SMTP not configured, notifications will only be logged");
            None
        }
    };
    let notifier = Notifier::new(pool.clone(), mailer);

    // Workers share the pool with request handlers and stop on shutdown.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handles = jobs::spawn_workers(pool.clone(), notifier.clone(), &config, shutdown_rx);

    let state = AppState {
        pool,
        config: config.clone(),
        notifier,
    };

    let app = Router::new()
        .merge(api::health::router())
        .merge(api::users::router())
        .merge(api::events::router(&state))
        .merge(api::seats::router(&state))
        .merge(api::holds::router(&state))
        .merge(api::bookings::router(&state))
        .merge(api::waitlist::router(&state))
        .merge(api::analytics::router(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Server is down; let the workers finish their in-flight item and exit.
    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, cleaning up...");
}
