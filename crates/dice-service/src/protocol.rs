//! Client wire protocol.
//!
//! Every WebSocket text frame is a JSON object `{"type": ..., "payload": ...}`.
//!
//! | Direction | `type` | `payload` |
//! |-----------|--------|-----------|
//! | in | `join` | requested name (string) |
//! | in | `roll` | die sizes (array of 0-255) |
//! | in | `profileUpdate` | new name (string) |
//! | out | `roll` | [`RollResults`] |
//! | out | `usersupdate` | [`UsersUpdateInfo`] |
//! | out | `error` | reason (string) |
//!
//! Unknown inbound types decode to [`ClientMessage::Unknown`] and are ignored
//! by the roller. A bad payload for a known type is a protocol error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actors::messages::{RollResults, UsersUpdateInfo};
use crate::errors::TransportError;

/// Largest inbound frame accepted, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 512;

/// Message from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Join(String),
    Roll(Vec<u8>),
    ProfileUpdate(String),
    /// A message type this server does not handle.
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl ClientMessage {
    /// Decode one text frame.
    ///
    /// Frames over [`MAX_MESSAGE_SIZE`] bytes are rejected before parsing.
    pub fn decode(text: &str) -> Result<Self, TransportError> {
        if text.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::Malformed(format!(
                "message exceeds {MAX_MESSAGE_SIZE} bytes"
            )));
        }

        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| TransportError::Malformed(e.to_string()))?;

        let message = match envelope.kind.as_str() {
            "join" => ClientMessage::Join(payload(envelope.payload, "join")?),
            "roll" => ClientMessage::Roll(payload(envelope.payload, "roll")?),
            "profileUpdate" => {
                ClientMessage::ProfileUpdate(payload(envelope.payload, "profileUpdate")?)
            }
            _ => ClientMessage::Unknown(envelope.kind),
        };

        Ok(message)
    }

    /// Wire name of this message type.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            ClientMessage::Join(_) => "join",
            ClientMessage::Roll(_) => "roll",
            ClientMessage::ProfileUpdate(_) => "profileUpdate",
            ClientMessage::Unknown(kind) => kind,
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(value: Value, kind: &str) -> Result<T, TransportError> {
    serde_json::from_value(value)
        .map_err(|e| TransportError::Malformed(format!("bad {kind} payload: {e}")))
}

/// Message to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "roll")]
    Roll(RollResults),
    #[serde(rename = "usersupdate")]
    UsersUpdate(UsersUpdateInfo),
    #[serde(rename = "error")]
    Error(String),
}

impl ServerMessage {
    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

/// One unit read from a participant's transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Message(ClientMessage),
    /// Transport-level liveness (ping or pong); only refreshes the deadline.
    KeepAlive,
}

/// One unit written to a participant's transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Message(ServerMessage),
    /// Transport-level heartbeat.
    Ping,
}
