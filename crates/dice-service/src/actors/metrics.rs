//! Actor metrics.
//!
//! Actors report lifecycle events through the [`MetricsSink`] trait they
//! are handed at construction. [`ActorMetrics`] is the production sink: it
//! keeps atomic counts and mirrors them into the Prometheus series defined
//! in [`crate::observability::metrics`].

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::observability::metrics as prom;

/// Actor type for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// `RoomActor` (one per live room).
    Room,
    /// `RollerActor` (one per connected participant).
    Roller,
}

impl ActorType {
    /// Returns the actor type as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Room => "room",
            ActorType::Roller => "roller",
        }
    }
}

/// Lifecycle events emitted by the actor system.
pub trait MetricsSink: Send + Sync + std::fmt::Debug {
    /// A room actor began processing events.
    fn room_started(&self);

    /// A room actor stopped (idle teardown or shutdown).
    fn room_stopped(&self);

    /// A WebSocket connection was upgraded, before any join.
    fn connection_opened(&self);

    /// A WebSocket connection ended, whether or not it joined a room.
    fn connection_closed(&self);

    /// A roll request was resolved into `dice` outcomes.
    fn roll_resolved(&self, dice: usize);

    /// An actor task panicked.
    fn actor_panicked(&self, actor_type: ActorType);
}

/// Aggregated metrics for the actor system.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    /// Rooms currently running.
    pub active_rooms: AtomicUsize,
    /// Roller actors currently running.
    pub active_connections: AtomicUsize,
    /// Roll requests resolved since startup.
    pub rolls_resolved: AtomicU64,
    /// Actor panics since startup (indicates bugs).
    pub actor_panics: AtomicU64,
}

impl ActorMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get current room count.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.active_rooms.load(Ordering::Relaxed)
    }

    /// Get current connection count.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Get total rolls resolved.
    #[must_use]
    pub fn roll_count(&self) -> u64 {
        self.rolls_resolved.load(Ordering::Relaxed)
    }
}

impl MetricsSink for ActorMetrics {
    fn room_started(&self) {
        let count = self.active_rooms.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_rooms_active(count as u64);
    }

    fn room_stopped(&self) {
        let count = self.active_rooms.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        prom::set_rooms_active(count as u64);
    }

    fn connection_opened(&self) {
        let count = self.active_connections.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_connections_active(count as u64);
    }

    fn connection_closed(&self) {
        let count = self.active_connections.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        prom::set_connections_active(count as u64);
    }

    fn roll_resolved(&self, dice: usize) {
        self.rolls_resolved.fetch_add(1, Ordering::Relaxed);
        prom::record_roll(dice);
    }

    fn actor_panicked(&self, actor_type: ActorType) {
        self.actor_panics.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            target: "dice.actor.panic",
            actor_type = actor_type.as_str(),
            total_panics = self.actor_panics.load(Ordering::Relaxed),
            "Actor panic detected - indicates bug, investigation required"
        );
        prom::record_actor_panic(actor_type.as_str());
    }
}
