//! Wire protocol for Volley.
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`Snapshot`], ids):
//!   the JSON objects exchanged with game clients.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): text ⇄ typed message.
//! - **Errors** ([`ProtocolError`]): malformed input.
//!
//! ```text
//! Transport (text) → Protocol (ClientMessage) → Router → Room
//! ```
//!
//! Ball geometry types come from `volley-physics` and are re-exported so
//! clients of this crate don't need a second dependency.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientMessage, GameId, LeaveReason, PlayerId, PlayerView, Role, SYSTEM_SENDER, Scores,
    ServerMessage, Snapshot, unix_millis,
};
pub use volley_physics::{Ball, Side, Vec2};
