//! Room handlers.
//!
//! - `POST /api/rooms` - Create a room; body is the desired name as a JSON string
//! - `GET /rooms/{room_name}` - Frontend page for a live room

use crate::errors::DiceError;
use crate::observability::record_error;
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    Json,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Longest room name accepted from a client, in characters.
pub const MAX_ROOM_NAME_LENGTH: usize = 1024;

/// Handler for POST /api/rooms
///
/// Reserves a unique room name and starts its actor. An empty name gets a
/// generated one.
///
/// # Response
///
/// - 201 Created with the allocated name as a JSON string
/// - 400 Bad Request if the body is not a JSON string or is too long
/// - 500 Internal Server Error if no unique name could be reserved
#[instrument(skip_all, name = "dice.handlers.rooms.create")]
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<String>), DiceError> {
    let requested = parse_room_name(&body).inspect_err(|e| {
        warn!(target: "dice.handlers.rooms", error = %e, "Rejected room creation");
        record_error("create_room", StatusCode::BAD_REQUEST.as_u16());
    })?;

    let name = state.registry.create_room(&requested).await.inspect_err(|e| {
        warn!(target: "dice.handlers.rooms", error = %e, "Room creation failed");
        record_error("create_room", StatusCode::INTERNAL_SERVER_ERROR.as_u16());
    })?;

    info!(target: "dice.handlers.rooms", room = %name, "Room created via API");

    Ok((StatusCode::CREATED, Json(name)))
}

/// Handler for GET /rooms/{room_name}
///
/// Serves the frontend entry page when the room is live.
#[instrument(skip_all, name = "dice.handlers.rooms.page", fields(room = %room_name))]
pub async fn room_page(
    State(state): State<Arc<AppState>>,
    Path(room_name): Path<String>,
) -> Result<Html<String>, DiceError> {
    if !state.registry.exists(&room_name).await {
        return Err(DiceError::RoomNotFound(room_name));
    }

    let index = state.config.frontend_dir.join("index.html");
    let page = tokio::fs::read_to_string(&index).await.map_err(|e| {
        DiceError::Internal(format!(
            "failed to read frontend index {}: {e}",
            index.display()
        ))
    })?;

    Ok(Html(page))
}

/// Body must be a single JSON string of at most [`MAX_ROOM_NAME_LENGTH`] characters.
fn parse_room_name(body: &[u8]) -> Result<String, DiceError> {
    let name: String = serde_json::from_slice(body)
        .map_err(|_| DiceError::BadRequest("Room name must be a JSON string".to_string()))?;

    if name.chars().count() > MAX_ROOM_NAME_LENGTH {
        return Err(DiceError::BadRequest(format!(
            "Room name must be at most {MAX_ROOM_NAME_LENGTH} characters"
        )));
    }

    Ok(name)
}
