//! Codec trait and the JSON implementation.
//!
//! The rest of the server only needs "text in, typed message out" and the
//! reverse. [`Codec`] is that seam; [`JsonCodec`] is the only format the
//! clients speak today.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts typed messages to and from the text carried by a connection.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Parses a text frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the text is malformed or doesn't
    /// match `T`.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use volley_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let msg: ClientMessage =
///     codec.decode(r#"{"type":"leave","gameId":"g1","playerId":"p1"}"#).unwrap();
/// assert!(matches!(msg, ClientMessage::Leave { .. }));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
