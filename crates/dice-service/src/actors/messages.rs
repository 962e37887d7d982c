//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via
//! `tokio::sync::mpsc`. Request-reply uses `tokio::sync::oneshot`.
//!
//! [`RollResults`] and [`UsersUpdateInfo`] also travel to clients as wire
//! payloads, so they carry their serde shape here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

/// Stable identity of one roller for the lifetime of its connection.
///
/// Names change on rename, ids do not, so the room matches removals and
/// renames by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RollerId(Uuid);

impl RollerId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RollerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RollerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of a single die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    /// Number of faces.
    pub dice: u8,
    /// Uniform draw in `[1, dice]`.
    pub result: u8,
}

/// All outcomes of one roll request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResults {
    /// Roller name at the moment the roll was resolved.
    pub name: String,
    pub date: DateTime<Utc>,
    pub results: Vec<RollResult>,
}

/// Roster as seen by one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersUpdateInfo {
    #[serde(rename = "self")]
    pub self_name: String,
    /// Every other participant, in join order.
    pub others: Vec<String>,
}

/// The room's side of one admitted roller.
///
/// The room owns the write side of the shared name and the outbound
/// senders; the roller actor holds the matching receivers.
#[derive(Debug)]
pub struct RollerSeat {
    pub id: RollerId,
    /// Current name. The room renames in place with `send_replace`.
    pub name: watch::Sender<String>,
    pub results: mpsc::Sender<RollResults>,
    pub users: mpsc::Sender<UsersUpdateInfo>,
}

impl RollerSeat {
    /// Snapshot of the current name.
    #[must_use]
    pub fn current_name(&self) -> String {
        self.name.borrow().clone()
    }
}

/// Messages sent to `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Admit a roller. Its requested name is the seat's current name.
    AddRoller { seat: RollerSeat },

    /// The roller's connection ended.
    RemoveRoller {
        roller_id: RollerId,
        /// Last name the roller saw, for logging only.
        name: String,
    },

    /// The roller asked for a new name.
    ProfileUpdate {
        roller_id: RollerId,
        old_name: String,
        new_name: String,
    },

    /// A roll was resolved by a roller actor.
    RollCompleted { results: RollResults },

    /// Get current room state (for diagnostics and tests).
    GetState {
        /// Response channel for room state.
        respond_to: oneshot::Sender<RoomState>,
    },
}

/// Snapshot of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomState {
    pub name: String,
    /// Roller names in join order.
    pub rollers: Vec<String>,
    /// Cached results, oldest first.
    pub cached_results: Vec<RollResults>,
}
