//! HTTP and WebSocket request handlers.

pub mod rooms;
pub mod ws;

pub use rooms::{create_room, room_page};
pub use ws::room_websocket;
