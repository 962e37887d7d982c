//! # Dice Test Utilities
//!
//! Shared test utilities for the dice service.
//!
//! This crate provides:
//! - Server test harness (`TestDiceServer` for E2E tests)
//! - WebSocket participant client (`TestRollerClient`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dice_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let server = TestDiceServer::spawn().await?;
//!     let room = server.create_room("lobby").await?;
//!
//!     let mut alice = TestRollerClient::join_room(&server.ws_url(&room), "alice").await?;
//!     let update = alice.next_message().await?;
//!     Ok(())
//! }
//! ```

pub mod server_harness;
pub mod ws_client;

// Re-export commonly used items
pub use server_harness::*;
pub use ws_client::*;
