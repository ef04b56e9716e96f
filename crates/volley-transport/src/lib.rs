//! Connection layer for Volley.
//!
//! The game core never touches sockets directly. It sees each client as a
//! [`Connection`]: a bidirectional channel of text messages that can be
//! closed and that reports disconnects by returning `Ok(None)` from
//! [`Connection::recv`]. [`Transport`] produces those connections.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique tag for a client link, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next id. Ids start at 1 and are never reused.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One frame read from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    /// The frame arrived but its payload is not text. The link is still
    /// usable; the string says what was wrong with the frame.
    Malformed(String),
}

/// A listener that hands out client links.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolves with the next client that completed its handshake.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single client link carrying text messages in both directions.
///
/// Sending and receiving may happen concurrently from different tasks:
/// a reader loop sits in `recv` while a writer task drains outbound
/// broadcasts through `send`.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes one text frame.
    fn send(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Waits for the next inbound frame. `Ok(None)` means the peer is gone
    /// and no more frames will arrive.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Inbound>, Self::Error>> + Send;

    /// Starts a graceful close. Safe to call on an already closed link.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn id(&self) -> ConnectionId;
}
