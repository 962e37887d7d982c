//! WebSocket handler for `GET /rooms/{room_name}/websocket`.
//!
//! The handler owns the connection only until the participant has joined:
//! it waits for the `join` message, routes the participant to its room and
//! then hands both halves of the socket to a [`RollerActor`].

use crate::actors::RollerActor;
use crate::errors::TransportError;
use crate::protocol::{ClientMessage, InboundFrame, OutboundFrame, ServerMessage};
use crate::routes::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Error frame sent when the first message is not a `join`.
const INVALID_INITIAL_MESSAGE: &str = "Invalid initial message";

/// Hard cap enforced by the WebSocket codec. Frames below it but over
/// [`crate::protocol::MAX_MESSAGE_SIZE`] reach the decoder, which answers
/// with an error frame.
const MAX_TRANSPORT_MESSAGE_SIZE: usize = 16 * 1024;

/// Handler for GET /rooms/{room_name}/websocket
pub async fn room_websocket(
    State(state): State<Arc<AppState>>,
    Path(room_name): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.max_message_size(MAX_TRANSPORT_MESSAGE_SIZE)
        .on_upgrade(move |socket| serve_socket(state, room_name, socket))
}

/// Count the connection for its whole life, joined or not.
#[instrument(skip_all, name = "dice.handlers.ws", fields(room = %room_name))]
async fn serve_socket(state: Arc<AppState>, room_name: String, socket: WebSocket) {
    state.metrics.connection_opened();
    run_session(&state, &room_name, socket).await;
    state.metrics.connection_closed();
}

async fn run_session(state: &Arc<AppState>, room_name: &str, socket: WebSocket) {
    let (sink, stream) = socket.split();
    let mut inbound = stream.map(decode_frame);
    let mut outbound = sink.sink_map_err(TransportError::socket).with(encode_frame);

    let requested = match await_join(&mut inbound, state).await {
        Ok(requested) => requested,
        Err(reason) => {
            debug!(target: "dice.handlers.ws", reason = %reason, "Connection ended before join");
            if let Some(text) = reason.client_message() {
                reject(&mut outbound, state, text).await;
            }
            return;
        }
    };

    let roller = match state.registry.add_roller(room_name, requested).await {
        Ok(roller) => roller,
        Err(e) => {
            warn!(target: "dice.handlers.ws", error = %e, "Join rejected");
            reject(&mut outbound, state, e.client_message()).await;
            return;
        }
    };

    info!(
        target: "dice.handlers.ws",
        roller_id = %roller.id(),
        "Participant joining room"
    );

    RollerActor::new(roller, Arc::clone(&state.metrics), state.session)
        .run(inbound, outbound)
        .await;
}

/// Read until the first message and require it to be a `join`.
async fn await_join<S>(inbound: &mut S, state: &AppState) -> Result<String, JoinFailure>
where
    S: Stream<Item = Result<InboundFrame, TransportError>> + Unpin,
{
    loop {
        let next = tokio::time::timeout(state.session.read_timeout, inbound.next())
            .await
            .map_err(|_| JoinFailure::Transport(TransportError::ReadTimeout))?;

        match next {
            None => return Err(JoinFailure::Transport(TransportError::Closed)),
            Some(Err(e)) => return Err(JoinFailure::Transport(e)),
            Some(Ok(InboundFrame::KeepAlive)) => {}
            Some(Ok(InboundFrame::Message(ClientMessage::Join(name)))) => return Ok(name),
            Some(Ok(InboundFrame::Message(other))) => {
                return Err(JoinFailure::NotJoin(other.kind().to_string()))
            }
        }
    }
}

#[derive(Debug)]
enum JoinFailure {
    Transport(TransportError),
    NotJoin(String),
}

impl JoinFailure {
    fn client_message(&self) -> Option<String> {
        match self {
            JoinFailure::Transport(e) => e.client_message(),
            JoinFailure::NotJoin(_) => Some(INVALID_INITIAL_MESSAGE.to_string()),
        }
    }
}

impl std::fmt::Display for JoinFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinFailure::Transport(e) => write!(f, "{e}"),
            JoinFailure::NotJoin(kind) => write!(f, "expected join, got {kind}"),
        }
    }
}

/// Send one error frame, then close.
async fn reject<K>(outbound: &mut K, state: &AppState, text: String)
where
    K: Sink<OutboundFrame, Error = TransportError> + Unpin,
{
    let frame = OutboundFrame::Message(ServerMessage::Error(text));
    let write_timeout = state.session.write_timeout;

    if let Ok(Err(e)) = tokio::time::timeout(write_timeout, outbound.send(frame)).await {
        debug!(target: "dice.handlers.ws", error = %e, "Could not deliver error frame");
    }
    let _ = tokio::time::timeout(write_timeout, outbound.close()).await;
}

fn decode_frame(message: Result<Message, axum::Error>) -> Result<InboundFrame, TransportError> {
    match message.map_err(TransportError::socket)? {
        Message::Text(text) => ClientMessage::decode(&text).map(InboundFrame::Message),
        Message::Ping(_) | Message::Pong(_) => Ok(InboundFrame::KeepAlive),
        Message::Close(_) => Err(TransportError::Closed),
        Message::Binary(_) => Err(TransportError::Malformed(
            "binary frames are not supported".to_string(),
        )),
    }
}

fn encode_frame(frame: OutboundFrame) -> future::Ready<Result<Message, TransportError>> {
    future::ready(match frame {
        OutboundFrame::Message(message) => message.encode().map(Message::Text),
        OutboundFrame::Ping => Ok(Message::Ping(Vec::new())),
    })
}
