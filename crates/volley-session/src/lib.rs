//! Player registry for Volley rooms.
//!
//! Each room owns one [`PlayerRegistry`]: who is in the room, which role
//! they hold, where their paddle is, when they were last heard from, and
//! the [`Outbox`] that reaches their connection.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)      ← one registry per GameSession, mutated by the room actor
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← PlayerId, Role, ServerMessage
//! ```
//!
//! The registry is a plain struct with no locking. It is only ever touched
//! from inside its room's actor task.

mod error;
mod player;
mod registry;

pub use error::SessionError;
pub use player::{DEFAULT_DISPLAY_NAME, OUTBOX_CAPACITY, Outbox, PlayerState, display_name};
pub use registry::PlayerRegistry;
