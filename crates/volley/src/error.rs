//! Unified error type for the Volley server.

use volley_protocol::ProtocolError;
use volley_room::RoomError;
use volley_session::SessionError;
use volley_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum VolleyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message that couldn't be decoded or encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A player-registry error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (unknown game, full, invalid position...).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A setting that couldn't be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl VolleyError {
    /// Status code sent to the client in an `error` message.
    pub fn code(&self) -> u16 {
        match self {
            Self::Protocol(_) => 400,
            Self::Room(e) => e.code(),
            Self::Session(SessionError::UnknownPlayer(_)) => 404,
            Self::Session(SessionError::RoomFull | SessionError::DuplicatePlayer(_)) => 409,
            Self::Session(SessionError::RecipientUnreachable | SessionError::RecipientBacklogged)
            | Self::Transport(_) => 503,
            Self::Config(_) => 500,
        }
    }
}
