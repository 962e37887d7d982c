//! `RoomRegistry` - process-wide directory of live rooms.
//!
//! The registry:
//! - Creates rooms under unique names and spawns their actors
//! - Answers existence checks
//! - Routes new rollers to their room
//! - Owns the root `CancellationToken` for graceful shutdown
//!
//! The directory map is the only state shared between actors. Room actors
//! remove their own entry when they go idle; nothing else removes entries
//! except the panic supervisor.

use crate::errors::DiceError;
use crate::names::uniquify;

use super::messages::RoomState;
use super::metrics::{ActorType, MetricsSink};
use super::roller::RollerHandle;
use super::room::{RoomActor, RoomActorHandle};
use super::RoomSettings;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

/// Room name to live room handle.
pub type RoomDirectory = Arc<RwLock<HashMap<String, RoomActorHandle>>>;

/// Reservation attempts before `create_room` gives up.
pub const MAX_RESERVATION_ATTEMPTS: usize = 100;

/// Handle to the room directory. Cheap to clone.
#[derive(Clone, Debug)]
pub struct RoomRegistry {
    rooms: RoomDirectory,
    settings: RoomSettings,
    metrics: Arc<dyn MetricsSink>,
    cancel_token: CancellationToken,
    tracker: TaskTracker,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(settings: RoomSettings, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            settings,
            metrics,
            cancel_token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Create a room and return its allocated name.
    ///
    /// An empty `requested` name gets a generated one; a taken name gets a
    /// numeric suffix.
    #[instrument(skip_all, name = "dice.actor.registry.create_room")]
    pub async fn create_room(&self, requested: &str) -> Result<String, DiceError> {
        if self.cancel_token.is_cancelled() {
            return Err(DiceError::Internal("registry is shutting down".to_string()));
        }

        for attempt in 1..=MAX_RESERVATION_ATTEMPTS {
            let candidate = {
                let rooms = self.rooms.read().await;
                let taken: HashSet<&str> = rooms.keys().map(String::as_str).collect();
                uniquify(requested, &taken)
            };

            let mut rooms = self.rooms.write().await;
            if rooms.contains_key(&candidate) {
                // Lost the race between snapshot and reservation
                debug!(
                    target: "dice.actor.registry",
                    candidate = %candidate,
                    attempt,
                    "Room name taken before reservation, retrying"
                );
                continue;
            }

            let (handle, task) = RoomActor::spawn(
                candidate.clone(),
                self.settings,
                self.cancel_token.child_token(),
                Arc::clone(&self.rooms),
                Arc::clone(&self.metrics),
                &self.tracker,
            );
            rooms.insert(candidate.clone(), handle);
            let total_rooms = rooms.len();
            drop(rooms);

            self.supervise(candidate.clone(), task);

            info!(
                target: "dice.actor.registry",
                requested = %requested,
                room = %candidate,
                total_rooms,
                "Room created"
            );
            return Ok(candidate);
        }

        warn!(
            target: "dice.actor.registry",
            requested = %requested,
            attempts = MAX_RESERVATION_ATTEMPTS,
            "Room name allocation exhausted"
        );
        Err(DiceError::NameAllocationExhausted)
    }

    /// Whether a room with this name is live.
    pub async fn exists(&self, name: &str) -> bool {
        self.rooms.read().await.contains_key(name)
    }

    /// Route a new roller to `room`.
    ///
    /// Returns as soon as admission is queued on the room; the room assigns
    /// the final name when it processes the request.
    #[instrument(skip_all, name = "dice.actor.registry.add_roller", fields(room = %room))]
    pub async fn add_roller(&self, room: &str, requested: String) -> Result<RollerHandle, DiceError> {
        let handle = self.room(room).await?;

        let (seat, roller) = RollerHandle::new(handle.clone(), requested);
        handle.add_roller(seat).await?;

        debug!(
            target: "dice.actor.registry",
            room = %room,
            roller_id = %roller.id(),
            "Roller queued for admission"
        );
        Ok(roller)
    }

    /// Snapshot of a room's state.
    pub async fn room_state(&self, room: &str) -> Result<RoomState, DiceError> {
        let handle = self.room(room).await?;
        handle.get_state().await
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Stop every room actor and wait for them to finish.
    pub async fn shutdown(&self, deadline: Duration) {
        info!(
            target: "dice.actor.registry",
            rooms = self.rooms.read().await.len(),
            "Shutting down rooms"
        );

        self.cancel_token.cancel();
        self.tracker.close();

        if tokio::time::timeout(deadline, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                target: "dice.actor.registry",
                remaining_tasks = self.tracker.len(),
                "Room shutdown timed out"
            );
        } else {
            info!(target: "dice.actor.registry", "All rooms stopped");
        }
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    async fn room(&self, room: &str) -> Result<RoomActorHandle, DiceError> {
        self.rooms
            .read()
            .await
            .get(room)
            .cloned()
            .ok_or_else(|| DiceError::RoomNotFound(room.to_string()))
    }

    /// Watch a room task; a panicked room leaves a dead entry behind that
    /// must be cleared here.
    fn supervise(&self, room: String, task: JoinHandle<()>) {
        let rooms = Arc::clone(&self.rooms);
        let metrics = Arc::clone(&self.metrics);

        self.tracker.spawn(async move {
            let Err(e) = task.await else {
                return;
            };
            if !e.is_panic() {
                return;
            }

            metrics.actor_panicked(ActorType::Room);
            metrics.room_stopped();

            let mut rooms = rooms.write().await;
            if rooms.get(&room).is_some_and(RoomActorHandle::is_closed) {
                rooms.remove(&room);
            }
            error!(
                target: "dice.actor.registry",
                room = %room,
                "Room actor panicked, entry removed"
            );
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::actors::metrics::ActorMetrics;

    fn registry_with(metrics: Arc<ActorMetrics>) -> RoomRegistry {
        RoomRegistry::new(
            RoomSettings {
                idle_timeout: Duration::from_secs(60),
                cached_results: 10,
            },
            metrics,
        )
    }

    fn registry() -> RoomRegistry {
        registry_with(ActorMetrics::new())
    }

    #[tokio::test]
    async fn test_create_room_uses_requested_name() {
        let registry = registry();

        let name = registry.create_room("blue-moon").await.unwrap();
        assert_eq!(name, "blue-moon");
        assert!(registry.exists("blue-moon").await);
        assert!(!registry.exists("red-moon").await);

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_create_room_suffixes_duplicates() {
        let registry = registry();

        assert_eq!(registry.create_room("table").await.unwrap(), "table");
        assert_eq!(registry.create_room("table").await.unwrap(), "table-1");
        assert_eq!(registry.create_room("table").await.unwrap(), "table-2");
        assert_eq!(registry.room_count().await, 3);

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_create_room_generates_name_for_empty_request() {
        let registry = registry();

        let name = registry.create_room("").await.unwrap();
        assert!(!name.is_empty());
        assert!(registry.exists(&name).await);

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_concurrent_creation_yields_unique_names() {
        let registry = registry();

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(
                async move { registry.create_room("party").await },
            ));
        }

        let mut names = HashSet::new();
        for task in tasks {
            let name = task.await.unwrap().unwrap();
            assert!(names.insert(name.clone()), "{name} allocated twice");
        }
        assert_eq!(names.len(), 20);
        assert!(names.contains("party"));
        assert_eq!(registry.room_count().await, 20);

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_add_roller_to_missing_room() {
        let registry = registry();

        let result = registry.add_roller("nowhere", "alice".to_string()).await;
        assert!(matches!(result, Err(DiceError::RoomNotFound(name)) if name == "nowhere"));
    }

    #[tokio::test]
    async fn test_add_roller_is_admitted() {
        let registry = registry();
        let room = registry.create_room("dice-night").await.unwrap();

        let first = registry.add_roller(&room, "alice".to_string()).await.unwrap();
        let second = registry.add_roller(&room, "alice".to_string()).await.unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(second.room_name(), "dice-night");

        let state = registry.room_state(&room).await.unwrap();
        assert_eq!(state.rollers, vec!["alice", "alice-1"]);
        assert_eq!(second.name(), "alice-1");

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_all_rooms() {
        let metrics = ActorMetrics::new();
        let registry = registry_with(metrics.clone());

        registry.create_room("one").await.unwrap();
        registry.create_room("two").await.unwrap();

        registry.shutdown(Duration::from_secs(5)).await;

        assert!(registry.is_shutting_down());
        assert_eq!(registry.room_count().await, 0);
        assert_eq!(metrics.room_count(), 0);
        assert!(matches!(
            registry.create_room("three").await,
            Err(DiceError::Internal(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_room_disappears_from_registry() {
        let registry = registry();
        let room = registry.create_room("sleepy").await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(registry.exists(&room).await);

        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!registry.exists(&room).await);

        // The name is free again and yields a brand-new room
        assert_eq!(registry.create_room("sleepy").await.unwrap(), "sleepy");
        assert!(registry.exists("sleepy").await);

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_occupied_room_survives_idle_timeout() {
        let registry = registry();
        let room = registry.create_room("busy").await.unwrap();

        let _roller = registry.add_roller(&room, "alice".to_string()).await.unwrap();

        tokio::time::advance(Duration::from_secs(300)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(registry.exists(&room).await);

        registry.shutdown(Duration::from_secs(1)).await;
    }
}
