//! `RollerActor` - per-connection actor bridging one participant to its room.
//!
//! Each `RollerActor` runs two halves on their own tasks:
//! - the inbound half reads client frames, resolves rolls and forwards
//!   rolls and renames to the room
//! - the outbound half writes roll results, roster updates and heartbeats
//!   to the client
//!
//! # Lifecycle
//!
//! 1. The registry enqueues the roller's seat on the room and hands back a
//!    [`RollerHandle`]
//! 2. The inbound half waits until the room has admitted the roller, then
//!    starts reading
//! 3. Either half stopping cancels the other (drop guard on a shared token)
//! 4. After both halves are done, exactly one removal is sent to the room
//!
//! The transport is abstract: any `Stream` of [`InboundFrame`] and `Sink` of
//! [`OutboundFrame`] works, which is how the WebSocket handler and the unit
//! tests plug in.

use crate::errors::TransportError;
use crate::protocol::{ClientMessage, InboundFrame, OutboundFrame, ServerMessage};

use super::messages::{RollResult, RollResults, RollerId, RollerSeat, UsersUpdateInfo};
use super::metrics::{ActorType, MetricsSink};
use super::room::RoomActorHandle;
use super::SessionSettings;

use chrono::Utc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Capacity of each outbound mailbox (results and roster updates).
pub const ROLLER_CHANNEL_BUFFER: usize = 16;

/// The transport side of an admitted (or admission-pending) roller.
#[derive(Debug)]
pub struct RollerHandle {
    id: RollerId,
    name: watch::Receiver<String>,
    room: RoomActorHandle,
    results: mpsc::Receiver<RollResults>,
    users: mpsc::Receiver<UsersUpdateInfo>,
}

impl RollerHandle {
    /// Create a matching seat (for the room) and handle (for the transport).
    #[must_use]
    pub fn new(room: RoomActorHandle, requested: String) -> (RollerSeat, RollerHandle) {
        let id = RollerId::new();
        let (name_tx, name_rx) = watch::channel(requested);
        let (results_tx, results_rx) = mpsc::channel(ROLLER_CHANNEL_BUFFER);
        let (users_tx, users_rx) = mpsc::channel(ROLLER_CHANNEL_BUFFER);

        let seat = RollerSeat {
            id,
            name: name_tx,
            results: results_tx,
            users: users_tx,
        };
        let handle = RollerHandle {
            id,
            name: name_rx,
            room,
            results: results_rx,
            users: users_rx,
        };

        (seat, handle)
    }

    #[must_use]
    pub fn id(&self) -> RollerId {
        self.id
    }

    /// Current name as last assigned by the room.
    #[must_use]
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    #[must_use]
    pub fn room_name(&self) -> &str {
        self.room.name()
    }
}

/// Resolve a roll request.
///
/// Sizes 0 and 1 are skipped; every other size gets one uniform draw in
/// `[1, size]`. All outcomes share one timestamp and name.
pub fn resolve_roll<R: Rng>(name: String, dice: &[u8], rng: &mut R) -> RollResults {
    let results = dice
        .iter()
        .filter(|&&size| size > 1)
        .map(|&size| RollResult {
            dice: size,
            result: rng.gen_range(1..=size),
        })
        .collect();

    RollResults {
        name,
        date: Utc::now(),
        results,
    }
}

/// The roller actor.
pub struct RollerActor {
    handle: RollerHandle,
    metrics: Arc<dyn MetricsSink>,
    settings: SessionSettings,
    cancel_token: CancellationToken,
}

impl RollerActor {
    #[must_use]
    pub fn new(
        handle: RollerHandle,
        metrics: Arc<dyn MetricsSink>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            handle,
            metrics,
            settings,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Token that stops both halves when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Spawn the actor on its own task.
    pub fn spawn<S, K>(self, inbound: S, outbound: K) -> JoinHandle<()>
    where
        S: Stream<Item = Result<InboundFrame, TransportError>> + Unpin + Send + 'static,
        K: Sink<OutboundFrame, Error = TransportError> + Unpin + Send + 'static,
    {
        tokio::spawn(self.run(inbound, outbound))
    }

    /// Drive the connection until either half stops, then leave the room.
    #[instrument(
        skip_all,
        name = "dice.actor.roller",
        fields(room = %self.handle.room.name(), roller_id = %self.handle.id)
    )]
    pub async fn run<S, K>(self, inbound: S, outbound: K)
    where
        S: Stream<Item = Result<InboundFrame, TransportError>> + Unpin + Send + 'static,
        K: Sink<OutboundFrame, Error = TransportError> + Unpin + Send + 'static,
    {
        let RollerActor {
            handle,
            metrics,
            settings,
            cancel_token,
        } = self;
        let RollerHandle {
            id,
            name,
            room,
            results,
            users,
        } = handle;

        debug!(
            target: "dice.actor.roller",
            room = %room.name(),
            roller_id = %id,
            "RollerActor started"
        );

        // Reader reports a reason to the writer so the client sees it
        let (error_tx, error_rx) = mpsc::channel(1);

        let reader = InboundHalf {
            inbound,
            id,
            name: name.clone(),
            room: room.clone(),
            metrics: Arc::clone(&metrics),
            read_timeout: settings.read_timeout,
            errors: error_tx,
            cancel_token: cancel_token.clone(),
        };
        let writer = OutboundHalf {
            outbound,
            results,
            users,
            errors: error_rx,
            ping_period: settings.ping_period,
            write_timeout: settings.write_timeout,
            cancel_token: cancel_token.clone(),
        };

        let (read_result, write_result) =
            tokio::join!(tokio::spawn(reader.run()), tokio::spawn(writer.run()));

        for result in [read_result, write_result] {
            if let Err(e) = result {
                if e.is_panic() {
                    metrics.actor_panicked(ActorType::Roller);
                }
            }
        }

        let final_name = name.borrow().clone();
        if let Err(e) = room.remove_roller(id, final_name.clone()).await {
            // Room already gone; it released our seat on its way out
            debug!(
                target: "dice.actor.roller",
                room = %room.name(),
                roller = %final_name,
                error = %e,
                "Room unavailable for removal"
            );
        }

        info!(
            target: "dice.actor.roller",
            room = %room.name(),
            roller = %final_name,
            "RollerActor stopped"
        );
    }
}

struct InboundHalf<S> {
    inbound: S,
    id: RollerId,
    name: watch::Receiver<String>,
    room: RoomActorHandle,
    metrics: Arc<dyn MetricsSink>,
    read_timeout: Duration,
    errors: mpsc::Sender<TransportError>,
    cancel_token: CancellationToken,
}

impl<S> InboundHalf<S>
where
    S: Stream<Item = Result<InboundFrame, TransportError>> + Unpin,
{
    async fn run(mut self) {
        let _guard = self.cancel_token.clone().drop_guard();

        let reason = match self.await_admission().await {
            Ok(()) => self.read_loop().await,
            Err(reason) => Some(reason),
        };

        if let Some(reason) = reason {
            debug!(
                target: "dice.actor.roller",
                room = %self.room.name(),
                roller_id = %self.id,
                reason = %reason,
                "Inbound half stopping"
            );
            // Capacity 1 and only ever one send, so this cannot be full
            let _ = self.errors.try_send(reason);
        }
    }

    /// Wait until the room has assigned our name.
    async fn await_admission(&mut self) -> Result<(), TransportError> {
        tokio::select! {
            () = self.cancel_token.cancelled() => Ok(()),
            changed = self.name.changed() => {
                changed.map_err(|_| TransportError::RoomUnavailable)
            }
        }
    }

    /// Returns the reason reading stopped, or `None` if cancelled.
    async fn read_loop(&mut self) -> Option<TransportError> {
        loop {
            let next = tokio::select! {
                () = self.cancel_token.cancelled() => return None,
                next = tokio::time::timeout(self.read_timeout, self.inbound.next()) => next,
            };

            let frame = match next {
                Err(_) => return Some(TransportError::ReadTimeout),
                Ok(None) => return Some(TransportError::Closed),
                Ok(Some(Err(e))) => return Some(e),
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                InboundFrame::KeepAlive => {}
                InboundFrame::Message(message) => {
                    if let Err(e) = self.handle_message(message).await {
                        return Some(e);
                    }
                }
            }
        }
    }

    async fn handle_message(&mut self, message: ClientMessage) -> Result<(), TransportError> {
        match message {
            ClientMessage::Roll(dice) => {
                let name = self.name.borrow().clone();
                let results = resolve_roll(name, &dice, &mut rand::thread_rng());
                self.metrics.roll_resolved(results.results.len());
                self.room
                    .roll_completed(results)
                    .await
                    .map_err(|_| TransportError::RoomUnavailable)
            }
            ClientMessage::ProfileUpdate(new_name) => {
                let old_name = self.name.borrow().clone();
                self.room
                    .profile_update(self.id, old_name, new_name)
                    .await
                    .map_err(|_| TransportError::RoomUnavailable)
            }
            other => {
                warn!(
                    target: "dice.actor.roller",
                    room = %self.room.name(),
                    roller_id = %self.id,
                    message_type = %other.kind(),
                    "Ignoring unexpected message"
                );
                Ok(())
            }
        }
    }
}

struct OutboundHalf<K> {
    outbound: K,
    results: mpsc::Receiver<RollResults>,
    users: mpsc::Receiver<UsersUpdateInfo>,
    errors: mpsc::Receiver<TransportError>,
    ping_period: Duration,
    write_timeout: Duration,
    cancel_token: CancellationToken,
}

impl<K> OutboundHalf<K>
where
    K: Sink<OutboundFrame, Error = TransportError> + Unpin,
{
    async fn run(mut self) {
        let _guard = self.cancel_token.clone().drop_guard();

        let mut ping = tokio::time::interval_at(Instant::now() + self.ping_period, self.ping_period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let frame = tokio::select! {
                biased;

                Some(reason) = self.errors.recv() => {
                    self.send_error(&reason).await;
                    break;
                }

                () = self.cancel_token.cancelled() => break,

                results = self.results.recv() => match results {
                    Some(results) => OutboundFrame::Message(ServerMessage::Roll(results)),
                    None => {
                        self.send_error(&TransportError::RoomUnavailable).await;
                        break;
                    }
                },

                update = self.users.recv() => match update {
                    Some(update) => OutboundFrame::Message(ServerMessage::UsersUpdate(update)),
                    None => {
                        self.send_error(&TransportError::RoomUnavailable).await;
                        break;
                    }
                },

                _ = ping.tick() => OutboundFrame::Ping,
            };

            if let Err(e) = self.write(frame).await {
                debug!(target: "dice.actor.roller", error = %e, "Write failed");
                break;
            }
        }

        if tokio::time::timeout(self.write_timeout, self.outbound.close())
            .await
            .is_err()
        {
            debug!(target: "dice.actor.roller", "Transport close timed out");
        }
    }

    async fn write(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        match tokio::time::timeout(self.write_timeout, self.outbound.send(frame)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::WriteTimeout),
        }
    }

    /// Best-effort error frame before the connection closes.
    async fn send_error(&mut self, reason: &TransportError) {
        if let Some(text) = reason.client_message() {
            let frame = OutboundFrame::Message(ServerMessage::Error(text));
            if let Err(e) = self.write(frame).await {
                debug!(target: "dice.actor.roller", error = %e, "Could not deliver error frame");
            }
        }
    }
}
