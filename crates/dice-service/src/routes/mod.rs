//! HTTP routes for the dice service.
//!
//! Defines the Axum router and application state.

use crate::actors::{MetricsSink, RoomRegistry, SessionSettings};
use crate::config::Config;
use crate::handlers;
use crate::observability::{health_router, HealthState};
use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live room directory.
    pub registry: RoomRegistry,

    /// Service configuration.
    pub config: Arc<Config>,

    /// Sink handed to every roller actor.
    pub metrics: Arc<dyn MetricsSink>,

    /// Transport deadlines for roller actors.
    pub session: SessionSettings,
}

impl AppState {
    #[must_use]
    pub fn new(registry: RoomRegistry, config: Arc<Config>, metrics: Arc<dyn MetricsSink>) -> Self {
        let session = config.session_settings();
        Self {
            registry,
            config,
            metrics,
            session,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health`, `/ready` - Liveness and readiness probes
/// - `/metrics` - Prometheus metrics endpoint
/// - `POST /api/rooms` - Create a room
/// - `/rooms/:room_name` - Frontend page for an existing room
/// - `/rooms/:room_name/websocket` - WebSocket upgrade into a room
/// - Static frontend files for everything else
/// - TraceLayer for request logging
/// - 30 second timeout on the room creation API
pub fn build_routes(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    health_state: Arc<HealthState>,
) -> Router {
    let frontend = ServeDir::new(&state.config.frontend_dir);

    let api_routes = Router::new()
        .route("/api/rooms", post(handlers::create_room))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state.clone());

    // No request timeout on room routes: the upgrade lives as long as the socket
    let room_routes = Router::new()
        .route("/rooms/:room_name", get(handlers::room_page))
        .route("/rooms/:room_name/websocket", get(handlers::room_websocket))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    api_routes
        .merge(room_routes)
        .merge(metrics_routes)
        .merge(health_router(health_state))
        .fallback_service(frontend)
        .layer(TraceLayer::new_for_http())
}

async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
