//! # Storefront API Server
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tracing ──► ApiConfig::load ──► Database (migrations) ──► adapters    │
//! │                                                               │         │
//! │                          session sweeper ◄── AppState ◄──────┘         │
//! │                                                  │                      │
//! │                                                  ▼                      │
//! │                             axum::serve (graceful shutdown)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use storefront_api::{build_router, sweeper, ApiConfig, AppState};
use storefront_checkout::{HostedSessionAdapter, TwoPhaseAdapter};
use storefront_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting storefront API...");

    let config = ApiConfig::load()?;
    info!(
        addr = %config.bind_address(),
        db = %config.database.path.display(),
        currency = %config.checkout.currency,
        "Configuration loaded"
    );

    let db = Database::new(
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections),
    )
    .await?;
    info!("Database ready");

    let hosted = HostedSessionAdapter::new(
        config.hosted.clone(),
        config.checkout.success_url.clone(),
        config.checkout.cancel_url.clone(),
    )?;
    let webhooks = hosted.webhook_verifier();
    let two_phase = TwoPhaseAdapter::new(config.two_phase.clone())?;

    let state = AppState::new(
        db.clone(),
        config.checkout.clone(),
        Arc::new(hosted),
        Arc::new(two_phase),
        webhooks,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = sweeper::spawn(
        db.clone(),
        Duration::from_secs(config.database.sweep_interval_secs),
        shutdown_rx,
    );

    let app = build_router(state, &config.server.cors_origins);
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(addr = %config.bind_address(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
