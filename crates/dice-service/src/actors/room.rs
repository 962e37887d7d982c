//! `RoomActor` - per-room actor that owns all room state.
//!
//! Each `RoomActor`:
//! - Owns the roster (join order), the bounded result cache and the idle timer
//! - Processes exactly one event at a time; a mutation and its broadcast are
//!   atomic with respect to every other event
//! - Removes itself from the room directory once its roster has been empty
//!   for the idle timeout
//!
//! # Backpressure
//!
//! Broadcasts `send().await` into each roller's bounded outbound mailbox. A
//! full mailbox blocks the room until it drains; a roller whose receiver is
//! gone is skipped.

use crate::errors::DiceError;
use crate::names::uniquify;

use super::messages::{
    RollResults, RollerId, RollerSeat, RoomMessage, RoomState, UsersUpdateInfo,
};
use super::metrics::MetricsSink;
use super::registry::RoomDirectory;
use super::RoomSettings;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

/// Channel buffer size for the room mailbox.
const ROOM_CHANNEL_BUFFER: usize = 16;

/// Handle to a `RoomActor`.
#[derive(Clone, Debug)]
pub struct RoomActorHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    name: String,
}

impl RoomActorHandle {
    /// Get the room name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a roller for admission.
    ///
    /// Returns once the request is queued, not once it is processed. Fails
    /// with `RoomNotFound` if the room has already stopped.
    pub async fn add_roller(&self, seat: RollerSeat) -> Result<(), DiceError> {
        self.sender
            .send(RoomMessage::AddRoller { seat })
            .await
            .map_err(|_| DiceError::RoomNotFound(self.name.clone()))
    }

    /// Notify the room that a roller's connection ended.
    pub async fn remove_roller(&self, roller_id: RollerId, name: String) -> Result<(), DiceError> {
        self.sender
            .send(RoomMessage::RemoveRoller { roller_id, name })
            .await
            .map_err(|e| DiceError::Internal(format!("channel send failed: {e}")))
    }

    /// Request a rename for a roller.
    pub async fn profile_update(
        &self,
        roller_id: RollerId,
        old_name: String,
        new_name: String,
    ) -> Result<(), DiceError> {
        self.sender
            .send(RoomMessage::ProfileUpdate {
                roller_id,
                old_name,
                new_name,
            })
            .await
            .map_err(|e| DiceError::Internal(format!("channel send failed: {e}")))
    }

    /// Publish a resolved roll to the room.
    pub async fn roll_completed(&self, results: RollResults) -> Result<(), DiceError> {
        self.sender
            .send(RoomMessage::RollCompleted { results })
            .await
            .map_err(|e| DiceError::Internal(format!("channel send failed: {e}")))
    }

    /// Get current room state.
    pub async fn get_state(&self) -> Result<RoomState, DiceError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomMessage::GetState { respond_to: tx })
            .await
            .map_err(|e| DiceError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| DiceError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the room actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Check if the room has stopped accepting messages.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Handle over a bare mailbox with no actor behind it.
    #[cfg(test)]
    pub(crate) fn from_sender(name: &str, sender: mpsc::Sender<RoomMessage>) -> Self {
        Self {
            sender,
            cancel_token: CancellationToken::new(),
            name: name.to_string(),
        }
    }
}

/// The room actor.
pub struct RoomActor {
    name: String,
    receiver: mpsc::Receiver<RoomMessage>,
    cancel_token: CancellationToken,
    settings: RoomSettings,
    directory: RoomDirectory,
    metrics: Arc<dyn MetricsSink>,
    /// Admitted rollers in join order.
    roster: Vec<RollerSeat>,
    /// Most recent results, oldest first, at most `settings.cached_results`.
    cache: VecDeque<RollResults>,
}

impl RoomActor {
    /// Spawn a room actor on `tracker`.
    ///
    /// The caller is expected to hold the directory write lock and insert
    /// the returned handle under `name` before releasing it.
    pub fn spawn(
        name: String,
        settings: RoomSettings,
        cancel_token: CancellationToken,
        directory: RoomDirectory,
        metrics: Arc<dyn MetricsSink>,
        tracker: &TaskTracker,
    ) -> (RoomActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);

        let actor = Self {
            name: name.clone(),
            receiver,
            cancel_token: cancel_token.clone(),
            settings,
            directory,
            metrics,
            roster: Vec::new(),
            cache: VecDeque::with_capacity(settings.cached_results),
        };

        let task_handle = tracker.spawn(actor.run());

        let handle = RoomActorHandle {
            sender,
            cancel_token,
            name,
        };

        (handle, task_handle)
    }

    /// Run the actor event loop.
    #[instrument(skip_all, name = "dice.actor.room", fields(room = %self.name))]
    async fn run(mut self) {
        self.metrics.room_started();
        info!(target: "dice.actor.room", room = %self.name, "RoomActor started");

        // A fresh room has nobody in it, so the countdown starts armed
        let idle = tokio::time::sleep(self.settings.idle_timeout);
        tokio::pin!(idle);
        let mut idle_armed = true;
        let mut deregistered = false;

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "dice.actor.room",
                        room = %self.name,
                        "RoomActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    let Some(message) = msg else {
                        info!(
                            target: "dice.actor.room",
                            room = %self.name,
                            "RoomActor channel closed, exiting"
                        );
                        break;
                    };

                    self.handle_message(message).await;

                    let empty = self.roster.is_empty();
                    if empty && !idle_armed {
                        idle.as_mut().reset(Instant::now() + self.settings.idle_timeout);
                        debug!(
                            target: "dice.actor.room",
                            room = %self.name,
                            idle_timeout_secs = self.settings.idle_timeout.as_secs(),
                            "Room empty, idle countdown armed"
                        );
                    }
                    idle_armed = empty;
                }

                () = &mut idle, if idle_armed => {
                    let mut rooms = self.directory.write().await;
                    if !self.receiver.is_empty() {
                        // Something was queued before we got the lock; it wins
                        continue;
                    }
                    rooms.remove(&self.name);
                    deregistered = true;
                    info!(
                        target: "dice.actor.room",
                        room = %self.name,
                        "Room idle, removed from directory"
                    );
                    break;
                }
            }
        }

        self.shutdown(deregistered).await;
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::AddRoller { seat } => self.handle_add(seat).await,
            RoomMessage::RemoveRoller { roller_id, name } => {
                self.handle_remove(roller_id, &name).await;
            }
            RoomMessage::ProfileUpdate {
                roller_id,
                old_name,
                new_name,
            } => {
                self.handle_profile_update(roller_id, &old_name, &new_name)
                    .await;
            }
            RoomMessage::RollCompleted { results } => self.handle_roll(results).await,
            RoomMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.get_state());
            }
        }
    }

    async fn handle_add(&mut self, seat: RollerSeat) {
        let requested = seat.current_name();
        let names = self.roster_names();
        let taken: HashSet<&str> = names.iter().map(String::as_str).collect();
        let name = uniquify(&requested, &taken);

        seat.name.send_replace(name.clone());
        self.roster.push(seat);

        info!(
            target: "dice.actor.room",
            room = %self.name,
            requested = %requested,
            roller = %name,
            rollers = self.roster.len(),
            "Roller joined"
        );

        self.broadcast_users().await;

        // Latecomers catch up on recent rolls, oldest first
        if let Some(seat) = self.roster.last() {
            for results in &self.cache {
                if seat.results.send(results.clone()).await.is_err() {
                    debug!(
                        target: "dice.actor.room",
                        room = %self.name,
                        roller = %name,
                        "Roller gone during cache replay"
                    );
                    break;
                }
            }
        }
    }

    async fn handle_remove(&mut self, roller_id: RollerId, name: &str) {
        let Some(index) = self.position(roller_id) else {
            let err = DiceError::RosterInconsistency {
                roller_id,
                name: name.to_string(),
            };
            warn!(target: "dice.actor.room", room = %self.name, error = %err, "Ignoring removal");
            return;
        };

        let seat = self.roster.remove(index);
        info!(
            target: "dice.actor.room",
            room = %self.name,
            roller = %seat.current_name(),
            rollers = self.roster.len(),
            "Roller left"
        );
        drop(seat);

        self.broadcast_users().await;
    }

    async fn handle_profile_update(&mut self, roller_id: RollerId, old_name: &str, new_name: &str) {
        let Some(index) = self.position(roller_id) else {
            let err = DiceError::RosterInconsistency {
                roller_id,
                name: old_name.to_string(),
            };
            warn!(target: "dice.actor.room", room = %self.name, error = %err, "Ignoring rename");
            return;
        };

        let others: Vec<String> = self
            .roster
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, seat)| seat.current_name())
            .collect();
        let taken: HashSet<&str> = others.iter().map(String::as_str).collect();
        let name = uniquify(new_name, &taken);

        if let Some(seat) = self.roster.get(index) {
            let previous = seat.name.send_replace(name.clone());
            info!(
                target: "dice.actor.room",
                room = %self.name,
                from = %previous,
                to = %name,
                "Roller renamed"
            );
        }

        self.broadcast_users().await;
    }

    async fn handle_roll(&mut self, results: RollResults) {
        self.cache.push_back(results.clone());
        while self.cache.len() > self.settings.cached_results {
            self.cache.pop_front();
        }

        debug!(
            target: "dice.actor.room",
            room = %self.name,
            roller = %results.name,
            dice = results.results.len(),
            "Broadcasting roll"
        );

        for seat in &self.roster {
            if seat.results.send(results.clone()).await.is_err() {
                debug!(
                    target: "dice.actor.room",
                    room = %self.name,
                    roller_id = %seat.id,
                    "Skipping roller with closed result mailbox"
                );
            }
        }
    }

    /// Send every roller its own view of the roster.
    async fn broadcast_users(&self) {
        let names = self.roster_names();

        for (index, (seat, own)) in self.roster.iter().zip(&names).enumerate() {
            let update = UsersUpdateInfo {
                self_name: own.clone(),
                others: names
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != index)
                    .map(|(_, n)| n.clone())
                    .collect(),
            };

            if seat.users.send(update).await.is_err() {
                debug!(
                    target: "dice.actor.room",
                    room = %self.name,
                    roller_id = %seat.id,
                    "Skipping roller with closed users mailbox"
                );
            }
        }
    }

    fn roster_names(&self) -> Vec<String> {
        self.roster.iter().map(RollerSeat::current_name).collect()
    }

    fn position(&self, roller_id: RollerId) -> Option<usize> {
        self.roster.iter().position(|seat| seat.id == roller_id)
    }

    fn get_state(&self) -> RoomState {
        RoomState {
            name: self.name.clone(),
            rollers: self.roster_names(),
            cached_results: self.cache.iter().cloned().collect(),
        }
    }

    /// Stop accepting messages and release every roller.
    async fn shutdown(&mut self, deregistered: bool) {
        if !deregistered {
            self.directory.write().await.remove(&self.name);
        }

        // Queued seats and reply channels are dropped here, which closes the
        // matching roller mailboxes.
        self.receiver.close();
        let mut dropped = 0usize;
        while self.receiver.try_recv().is_ok() {
            dropped += 1;
        }
        let rollers = self.roster.len();
        self.roster.clear();

        self.metrics.room_stopped();
        info!(
            target: "dice.actor.room",
            room = %self.name,
            rollers,
            dropped_messages = dropped,
            cached_results = self.cache.len(),
            "RoomActor stopped"
        );
    }
}
