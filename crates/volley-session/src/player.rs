//! A single room member and the channel used to reach it.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use volley_protocol::{PlayerId, PlayerView, Role, ServerMessage, Vec2};

use crate::SessionError;

/// Display name given to players who join without one.
pub const DEFAULT_DISPLAY_NAME: &str = "Player";

// ---------------------------------------------------------------------------
// PlayerState
// ---------------------------------------------------------------------------

/// What the server knows about one player in one room.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: PlayerId,
    pub display_name: String,
    pub role: Role,
    /// Always inside the playfield; the room rejects anything else.
    pub position: Vec2,
    /// Refreshed by every inbound message from this player.
    pub last_activity: Instant,
}

impl PlayerState {
    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.display_name.clone(),
            role: self.role,
            position: self.position,
        }
    }
}

/// Trims `name` and falls back to [`DEFAULT_DISPLAY_NAME`] when nothing is
/// left.
pub fn display_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_owned(),
        _ => DEFAULT_DISPLAY_NAME.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// Messages a connection may have queued but not yet written before it is
/// treated as stalled.
pub const OUTBOX_CAPACITY: usize = 256;

/// Sending half of a connection's outbound queue.
///
/// The connection task owns the receiver and writes whatever arrives to
/// the socket, so delivering never waits on the network. One connection
/// hands a clone of its outbox to every room it joins.
///
/// The queue is bounded. A delivery that finds it full is refused and
/// raises the overflow signal; the connection task watches for that with
/// [`overflowed`](Self::overflowed) and drops the client.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<ServerMessage>,
    overflow: Arc<Notify>,
}

impl Outbox {
    /// Creates an outbox with the default capacity together with the
    /// receiver its connection drains.
    pub fn channel() -> (Self, mpsc::Receiver<ServerMessage>) {
        Self::bounded(OUTBOX_CAPACITY)
    }

    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let outbox = Self {
            tx,
            overflow: Arc::new(Notify::new()),
        };
        (outbox, rx)
    }

    /// Queues a message for the connection without waiting.
    ///
    /// # Errors
    /// - [`SessionError::RecipientUnreachable`] if the receiver was dropped
    /// - [`SessionError::RecipientBacklogged`] if the queue is full; the
    ///   overflow signal is raised as well
    pub fn deliver(&self, msg: ServerMessage) -> Result<(), SessionError> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => {
                self.overflow.notify_one();
                SessionError::RecipientBacklogged
            }
            TrySendError::Closed(_) => SessionError::RecipientUnreachable,
        })
    }

    /// Resolves once a delivery has been refused because the queue was
    /// full. An overflow that happened before the call counts.
    pub async fn overflowed(&self) {
        self.overflow.notified().await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// `true` if both outboxes feed the same connection.
    pub fn same_channel(&self, other: &Outbox) -> bool {
        self.tx.same_channel(&other.tx)
    }
}
