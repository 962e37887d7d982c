//! Dice Rooms Service Library
//!
//! A real-time, multi-room dice rolling service. Clients create a room over
//! HTTP, then join it over a WebSocket, roll dice and see every other
//! participant's rolls as they happen.
//!
//! # Architecture
//!
//! ```text
//! RoomRegistry (one per process)
//! └── RoomActor (one per live room)
//!     ├── owns roster, recent results and idle timer
//!     └── serves N RollerActors
//!         └── RollerActor (one per WebSocket connection)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single writer per room**: a room's roster and result cache are only
//!   touched by its own task
//! - **Self-removing rooms**: an empty room tears itself down after an idle
//!   period
//! - **Unique names**: room names and display names within a room are made
//!   unique with numeric suffixes
//!
//! # Modules
//!
//! - [`actors`] - Registry, room and roller actors
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with appropriate HTTP status codes
//! - [`handlers`] - HTTP and WebSocket handlers
//! - [`names`] - Name uniquifier and room name generator
//! - [`observability`] - Prometheus metrics and health probes
//! - [`protocol`] - Client wire format
//! - [`routes`] - Axum router and application state

pub mod actors;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod names;
pub mod observability;
pub mod protocol;
pub mod routes;
