//! Dice service error types.
//!
//! `DiceError` covers the registry, the room actor and the HTTP boundary.
//! `TransportError` covers everything that can end a single participant's
//! connection; it never crosses into a room actor.
//!
//! Internal details are logged server-side but not exposed to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::actors::messages::RollerId;

/// Dice service error type.
#[derive(Debug, Error)]
pub enum DiceError {
    /// The target room does not exist (never created or already torn down).
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Bounded room name allocation lost every reservation race.
    #[error("Room name allocation exhausted")]
    NameAllocationExhausted,

    /// A removal or rename named a roller the room does not know.
    ///
    /// Only constructed and logged by the room actor, never returned.
    #[error("Roster inconsistency: roller {roller_id} ({name}) not in room")]
    RosterInconsistency { roller_id: RollerId, name: String },

    /// Request failed validation at the HTTP boundary.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Actor channel failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DiceError {
    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            DiceError::RoomNotFound(_) => "Room not found".to_string(),
            DiceError::BadRequest(reason) => reason.clone(),
            DiceError::NameAllocationExhausted
            | DiceError::RosterInconsistency { .. }
            | DiceError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            DiceError::RoomNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            DiceError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            DiceError::NameAllocationExhausted
            | DiceError::RosterInconsistency { .. }
            | DiceError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for DiceError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Log actual error server-side, return generic message to client
            tracing::error!(target: "dice.errors", error = %self, "Request failed");
        }

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.client_message(),
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Errors at the participant transport boundary.
///
/// Any of these ends the participant's connection and triggers its
/// removal from the room.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The peer closed the connection.
    #[error("connection closed")]
    Closed,

    /// No frame arrived within the read deadline.
    #[error("read deadline exceeded")]
    ReadTimeout,

    /// A frame could not be written within the write deadline.
    #[error("write deadline exceeded")]
    WriteTimeout,

    /// The peer sent something that is not a valid message.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Underlying socket failure.
    #[error("socket error: {0}")]
    Socket(String),

    /// The room stopped accepting messages from this participant.
    #[error("room unavailable")]
    RoomUnavailable,
}

impl TransportError {
    /// Wrap any displayable socket error.
    pub fn socket(err: impl std::fmt::Display) -> Self {
        TransportError::Socket(err.to_string())
    }

    /// Text for the error frame sent to the participant before closing,
    /// or `None` when the connection is already gone.
    pub fn client_message(&self) -> Option<String> {
        match self {
            TransportError::Closed | TransportError::Socket(_) | TransportError::WriteTimeout => {
                None
            }
            TransportError::ReadTimeout => Some("Connection timed out".to_string()),
            TransportError::Malformed(reason) => Some(format!("Invalid message: {reason}")),
            TransportError::RoomUnavailable => Some("Room closed".to_string()),
        }
    }
}
