//! Courtside scorer binary entrypoint wiring the Ledger, the provider, the sync worker and the HTTP surface.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use courtside_scorer::{
    config::AppConfig,
    dao::{ledger::HttpLedger, provider::HttpGameProvider},
    routes,
    services::{connectivity_service, session_service, sync_service},
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let ledger = HttpLedger::new((&config.ledger).into()).context("building ledger client")?;
    let provider =
        HttpGameProvider::new((&config.provider).into()).context("building provider client")?;
    let port = config.port;
    let boot_game = config.boot_game;

    let app_state = AppState::new(config, Arc::new(ledger), Arc::new(provider));

    tokio::spawn(sync_service::run_worker(app_state.clone()));
    tokio::spawn(connectivity_service::run_monitor(app_state.clone()));

    if let Some(game_id) = boot_game {
        match session_service::load_session(&app_state, game_id).await {
            Ok(view) => info!(%game_id, pending = view.pending_count, "boot session loaded"),
            Err(err) => warn!(%game_id, error = %err, "could not load boot session"),
        }
    }

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
