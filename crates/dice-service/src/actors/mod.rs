//! Actor model implementation for the dice service.
//!
//! ```text
//! RoomRegistry (one per process, shared directory behind a RwLock)
//! └── RoomActor (one per live room)
//!     ├── owns roster, result cache and idle timer
//!     └── serves N RollerActors
//!         └── RollerActor (one per connection, inbound + outbound halves)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single writer**: room state is only touched by its own event loop
//! - **Bounded mailboxes**: every channel is bounded; a full roller mailbox
//!   blocks the room rather than dropping updates
//! - **CancellationToken propagation**: the registry owns the root token,
//!   rooms get child tokens
//! - **Identity over names**: rollers are matched by [`RollerId`], names are
//!   a mutable attribute shared through a `watch` channel
//!
//! # Modules
//!
//! - [`registry`] - `RoomRegistry`, the room directory
//! - [`room`] - `RoomActor` per live room
//! - [`roller`] - `RollerActor` per connected participant
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - `MetricsSink` and the atomic `ActorMetrics`

pub mod messages;
pub mod metrics;
pub mod registry;
pub mod roller;
pub mod room;

use std::time::Duration;

pub use messages::*;
pub use metrics::{ActorMetrics, ActorType, MetricsSink};
pub use registry::{RoomDirectory, RoomRegistry};
pub use roller::{resolve_roll, RollerActor, RollerHandle};
pub use room::{RoomActor, RoomActorHandle};

/// Tunables for every room actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSettings {
    /// How long an empty room lingers before removing itself.
    pub idle_timeout: Duration,
    /// Roll results kept for replay to newcomers.
    pub cached_results: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            cached_results: 10,
        }
    }
}

/// Tunables for every roller actor's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Heartbeat period.
    pub ping_period: Duration,
    /// Deadline for the next inbound frame.
    pub read_timeout: Duration,
    /// Deadline for each outbound write.
    pub write_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ping_period: Duration::from_secs(54),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
        }
    }
}
