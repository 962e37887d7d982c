//! Test server harness for E2E testing
//!
//! Provides `TestDiceServer` for spawning real dice service instances in tests.

use dice_service::actors::{ActorMetrics, RoomRegistry};
use dice_service::config::Config;
use dice_service::observability::HealthState;
use dice_service::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the dice service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<()> {
///     let server = TestDiceServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestDiceServer {
    addr: SocketAddr,
    config: Arc<Config>,
    registry: RoomRegistry,
    metrics: Arc<ActorMetrics>,
    _handle: JoinHandle<()>,
}

impl TestDiceServer {
    /// Spawn a server with default configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(HashMap::new()).await
    }

    /// Spawn a server with configuration overrides (`DICE_*` variables).
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    /// - Use a Prometheus recorder that is not installed globally
    pub async fn spawn_with_vars(mut vars: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        vars.insert("DICE_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string());

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;
        let config = Arc::new(config);

        let metrics = ActorMetrics::new();
        let registry = RoomRegistry::new(config.room_settings(), metrics.clone());
        let state = Arc::new(AppState::new(
            registry.clone(),
            Arc::clone(&config),
            metrics.clone(),
        ));

        // Each test server renders from its own recorder
        let prometheus_handle = PrometheusBuilder::new().build_recorder().handle();
        let health_state = Arc::new(HealthState::new());
        health_state.set_ready();

        let app = routes::build_routes(state, prometheus_handle, health_state);

        let listener = tokio::net::TcpListener::bind(&config.bind_address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            registry,
            metrics,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the WebSocket URL for a room.
    pub fn ws_url(&self, room: &str) -> String {
        format!("ws://{}/rooms/{}/websocket", self.addr, room)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The server's room registry, for assertions that bypass HTTP.
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// The server's actor metrics.
    pub fn metrics(&self) -> &ActorMetrics {
        &self.metrics
    }

    /// Create a room over HTTP and return its allocated name.
    pub async fn create_room(&self, requested: &str) -> Result<String, anyhow::Error> {
        let response = reqwest::Client::new()
            .post(format!("{}/api/rooms", self.url()))
            .json(&requested)
            .send()
            .await?;

        anyhow::ensure!(
            response.status() == reqwest::StatusCode::CREATED,
            "room creation returned {}",
            response.status()
        );
        Ok(response.json::<String>().await?)
    }
}

impl Drop for TestDiceServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestDiceServer::spawn().await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);

        Ok(())
    }

    #[tokio::test]
    async fn test_server_provides_addr() -> Result<(), anyhow::Error> {
        let server = TestDiceServer::spawn().await?;

        let addr = server.addr();
        assert!(addr.ip().is_loopback());
        assert!(addr.port() > 0);
        assert_eq!(server.url(), format!("http://{}", addr));
        assert_eq!(
            server.ws_url("lobby"),
            format!("ws://{}/rooms/lobby/websocket", addr)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_server_applies_config_overrides() -> Result<(), anyhow::Error> {
        let server = TestDiceServer::spawn_with_vars(HashMap::from([(
            "DICE_CACHED_RESULTS".to_string(),
            "3".to_string(),
        )]))
        .await?;

        assert_eq!(server.config().cached_results, 3);
        assert_eq!(server.config().bind_address, "127.0.0.1:0");

        Ok(())
    }

    #[tokio::test]
    async fn test_create_room_helper() -> Result<(), anyhow::Error> {
        let server = TestDiceServer::spawn().await?;

        let name = server.create_room("helper").await?;
        assert_eq!(name, "helper");
        assert!(server.registry().exists("helper").await);

        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_servers_different_ports() -> Result<(), anyhow::Error> {
        let server1 = TestDiceServer::spawn().await?;
        let server2 = TestDiceServer::spawn().await?;

        assert_ne!(server1.addr(), server2.addr());

        let response1 = reqwest::get(format!("{}/health", server1.url())).await?;
        assert_eq!(response1.status(), 200);

        let response2 = reqwest::get(format!("{}/health", server2.url())).await?;
        assert_eq!(response2.status(), 200);

        Ok(())
    }
}
