use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use cinelock_api::{app, state::{AppState, AuthConfig}, worker};
use cinelock_core::SystemClock;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinelock_api=debug,cinelock_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cinelock_store::app_config::Config::load().context("Failed to load config")?;
    tracing::info!(
        backend = ?config.store.backend,
        hold_seconds = config.locks.hold_seconds,
        refresh = ?config.locks.refresh_policy,
        "Starting Cinelock API on port {}",
        config.server.port
    );

    let store = cinelock_store::connect(&config.store)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect lock store: {}", e))?;

    let app_state = AppState::new(
        store,
        Arc::new(SystemClock),
        &config.locks,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = worker::start_expiry_reaper(&app_state, config.locks.sweep_interval_seconds, shutdown_rx);

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = reaper {
        let _ = handle.await;
    }
    Ok(())
}
