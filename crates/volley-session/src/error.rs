//! Error types for the player registry.

use volley_protocol::PlayerId;

/// Errors returned by [`PlayerRegistry`](crate::PlayerRegistry) and
/// [`Outbox`](crate::Outbox).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Both roles are taken.
    #[error("room is full")]
    RoomFull,

    /// A player with this id is already registered in the room.
    #[error("player {0} is already in the room")]
    DuplicatePlayer(PlayerId),

    /// No player with this id is registered in the room.
    #[error("player {0} is not in the room")]
    UnknownPlayer(PlayerId),

    /// The recipient's outbound channel is closed (its connection task is
    /// gone). Broadcasts log and skip this; it never reaches a client.
    #[error("recipient is unreachable")]
    RecipientUnreachable,

    /// The recipient's outbound queue is full: its connection stopped
    /// draining. The connection is dropped rather than buffered further.
    #[error("recipient is not keeping up")]
    RecipientBacklogged,
}
