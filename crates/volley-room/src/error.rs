//! Error types for the room layer.

use volley_protocol::{GameId, PlayerId, Vec2};
use volley_session::SessionError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this id exists.
    #[error("game {0} not found")]
    UnknownGame(GameId),

    /// The sender is not a member of the room.
    #[error("player {0} is not in this game")]
    UnknownPlayer(PlayerId),

    /// Both roles are taken.
    #[error("game {0} is full")]
    RoomFull(GameId),

    /// A player with this id is already in the room.
    #[error("player {0} is already in this game")]
    DuplicatePlayer(PlayerId),

    /// The position is outside the playfield or not finite.
    #[error("position ({}, {}) is outside the playfield", .0.x, .0.y)]
    InvalidPosition(Vec2),

    /// The room's actor has stopped or its queue is closed.
    #[error("game {0} is unavailable")]
    Unavailable(GameId),
}

impl RoomError {
    /// HTTP-style status code reported to clients in `error` messages.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidPosition(_) => 400,
            Self::UnknownGame(_) | Self::UnknownPlayer(_) => 404,
            Self::RoomFull(_) | Self::DuplicatePlayer(_) => 409,
            Self::Unavailable(_) => 503,
        }
    }

    pub(crate) fn from_session(game_id: &GameId, err: SessionError) -> Self {
        match err {
            SessionError::RoomFull => Self::RoomFull(game_id.clone()),
            SessionError::DuplicatePlayer(id) => Self::DuplicatePlayer(id),
            SessionError::UnknownPlayer(id) => Self::UnknownPlayer(id),
            SessionError::RecipientUnreachable | SessionError::RecipientBacklogged => {
                Self::Unavailable(game_id.clone())
            }
        }
    }
}
