//! WebSocket client for driving a room from tests.
//!
//! Speaks the same JSON envelope as the browser frontend.

use dice_service::protocol::ServerMessage;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long `next_message` waits before failing the test.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected participant.
///
/// # Example
/// ```rust,ignore
/// let mut alice = TestRollerClient::connect(&server.ws_url(&room)).await?;
/// alice.join("alice").await?;
/// let update = alice.next_message().await?;
/// ```
pub struct TestRollerClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestRollerClient {
    /// Open a WebSocket to `url`.
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let (socket, _response) = connect_async(url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", url, e))?;
        Ok(Self { socket })
    }

    /// Connect and send `join` in one step.
    pub async fn join_room(url: &str, name: &str) -> Result<Self, anyhow::Error> {
        let mut client = Self::connect(url).await?;
        client.join(name).await?;
        Ok(client)
    }

    pub async fn join(&mut self, name: &str) -> Result<(), anyhow::Error> {
        self.send_json(json!({ "type": "join", "payload": name })).await
    }

    pub async fn roll(&mut self, dice: &[u8]) -> Result<(), anyhow::Error> {
        self.send_json(json!({ "type": "roll", "payload": dice })).await
    }

    pub async fn profile_update(&mut self, name: &str) -> Result<(), anyhow::Error> {
        self.send_json(json!({ "type": "profileUpdate", "payload": name }))
            .await
    }

    /// Send an arbitrary JSON value as a text frame.
    pub async fn send_json(&mut self, value: serde_json::Value) -> Result<(), anyhow::Error> {
        self.send_text(&value.to_string()).await
    }

    /// Send a raw text frame.
    pub async fn send_text(&mut self, text: &str) -> Result<(), anyhow::Error> {
        self.socket.send(Message::text(text)).await?;
        Ok(())
    }

    /// Next server message, skipping control frames.
    ///
    /// Fails if nothing arrives within [`RECEIVE_TIMEOUT`] or the server
    /// closes the connection first.
    pub async fn next_message(&mut self) -> Result<ServerMessage, anyhow::Error> {
        loop {
            let frame = tokio::time::timeout(RECEIVE_TIMEOUT, self.socket.next())
                .await
                .map_err(|_| anyhow::anyhow!("Timed out waiting for a server message"))?;

            match frame {
                None => anyhow::bail!("Connection closed while waiting for a message"),
                Some(Err(e)) => anyhow::bail!("WebSocket error: {}", e),
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Close(_))) => {
                    anyhow::bail!("Server closed the connection while waiting for a message")
                }
                Some(Ok(_)) => {}
            }
        }
    }

    /// Wait until the server closes the connection, skipping control frames.
    ///
    /// Fails if a text message arrives first.
    pub async fn expect_closed(&mut self) -> Result<(), anyhow::Error> {
        loop {
            let frame = tokio::time::timeout(RECEIVE_TIMEOUT, self.socket.next())
                .await
                .map_err(|_| anyhow::anyhow!("Timed out waiting for the connection to close"))?;

            match frame {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => return Ok(()),
                Some(Ok(Message::Text(text))) => {
                    anyhow::bail!("Expected close, got message: {}", text.as_str())
                }
                Some(Ok(_)) => {}
            }
        }
    }

    /// Close the connection from the client side.
    pub async fn close(mut self) -> Result<(), anyhow::Error> {
        self.socket.close(None).await?;
        Ok(())
    }
}
