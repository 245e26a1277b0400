use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geodrop_api::config::ServerConfig;
use geodrop_api::router::build_app_router;
use geodrop_api::state::AppState;
use geodrop_api::{background, ws};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geodrop_api=debug,tower_http=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(
        host = %config.host,
        port = config.port,
        threshold_meters = config.proximity_threshold_meters,
        session_timeout_secs = config.session_timeout.as_secs(),
        "Loaded server configuration"
    );

    // --- App state ---
    let state = AppState::new(config.clone());
    let registry = Arc::clone(&state.registry);
    let cancel = CancellationToken::new();

    // --- Broadcast dispatcher ---
    let dispatcher = ws::Dispatcher::new(Arc::clone(&registry), config.proximity_threshold_meters);
    let dispatcher_handle = tokio::spawn(dispatcher.run(cancel.clone()));

    // --- Reaper ---
    let reaper_handle = tokio::spawn(background::reaper::run(
        Arc::clone(&registry),
        config.reaper_interval,
        config.session_timeout,
        cancel.clone(),
    ));

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&registry), config.heartbeat_interval);

    tracing::info!("Presence services started (dispatcher, reaper, heartbeat)");

    // --- Router ---
    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Upgraded sockets outlive the HTTP server, so close them as soon as the
    // signal arrives rather than after `serve` returns.
    let shutdown_registry = Arc::clone(&registry);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_registry.shutdown_all().await;
        })
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let _ = tokio::time::timeout(config.shutdown_timeout, dispatcher_handle).await;
    let _ = tokio::time::timeout(config.shutdown_timeout, reaper_handle).await;
    tracing::info!("Dispatcher and reaper stopped");

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
