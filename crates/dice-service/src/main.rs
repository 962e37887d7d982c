//! Dice Rooms Service
//!
//! Real-time multi-room dice rolling over WebSocket.
//!
//! # Servers
//!
//! A single HTTP server (default: 0.0.0.0:8080) carries the room API, the
//! room WebSockets, health probes, Prometheus metrics and the static
//! frontend.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing (debug level when `DICE_DEBUG` is set)
//! 3. Initialize Prometheus metrics recorder
//! 4. Build the room registry
//! 5. Bind the listener and mark the service ready
//! 6. Serve until Ctrl+C or SIGTERM, then stop every room

#![warn(clippy::pedantic)]

use std::sync::Arc;
use std::time::Duration;

use dice_service::actors::{ActorMetrics, RoomRegistry};
use dice_service::config::Config;
use dice_service::observability::{init_metrics_recorder, HealthState};
use dice_service::routes::{build_routes, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time allowed for room actors to stop after the server has drained.
const ROOM_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration first: it decides the log level
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    let default_filter = if config.debug {
        "dice_service=debug,tower_http=debug"
    } else {
        "dice_service=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Dice Rooms service");
    info!(
        bind_address = %config.bind_address,
        frontend_dir = %config.frontend_dir.display(),
        debug = config.debug,
        room_idle_seconds = config.room_idle_seconds,
        cached_results = config.cached_results,
        ping_period_seconds = config.ping_period_seconds,
        pong_wait_seconds = config.pong_wait_seconds,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());

    let config = Arc::new(config);
    let metrics = ActorMetrics::new();
    let registry = RoomRegistry::new(config.room_settings(), metrics.clone());
    let state = Arc::new(AppState::new(registry.clone(), Arc::clone(&config), metrics));

    let app = build_routes(state, prometheus_handle, Arc::clone(&health_state));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .map_err(|e| {
            error!(error = %e, bind_address = %config.bind_address, "Failed to bind listener");
            e
        })?;
    info!(addr = %listener.local_addr()?, "Dice Rooms listening");

    health_state.set_ready();

    let shutdown_health = Arc::clone(&health_state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, initiating graceful shutdown...");
            // Stop receiving traffic before connections drain
            shutdown_health.set_not_ready();
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            e
        })?;

    registry.shutdown(ROOM_SHUTDOWN_DEADLINE).await;

    info!("Dice Rooms shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Without them the service
/// cannot shut down gracefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
