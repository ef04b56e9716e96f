//! Game sessions for Volley.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns one
//! [`GameSession`]: its players, ball, and score. An optional tick loop
//! steps the simulation on its own clock.
//!
//! # Key types
//!
//! - [`GameSession`]: the synchronous match state and its operations
//! - [`SessionRegistry`]: creates rooms on first join, hands out handles
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomConfig`]: physics, winning score, tick rate

mod config;
mod error;
mod game;
mod manager;
mod room;

pub use config::{DEFAULT_CHANNEL_SIZE, RoomConfig};
pub use error::RoomError;
pub use game::{Action, ActionOutcome, GameSession, Joined};
pub use manager::SessionRegistry;
pub use room::{RoomHandle, SweepReport};
