//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire messages.
///
/// Any of these on an inbound message means the message is malformed:
/// the sender gets an `error` reply and nothing else happens.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The text is not valid JSON, has an unknown `type`, or is missing a
    /// required field.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but breaks a protocol rule (e.g. an empty
    /// `gameId`).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
