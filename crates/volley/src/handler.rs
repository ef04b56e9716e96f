//! Per-connection handler.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Spawn a writer task that drains the connection's outbox to the socket
//!   2. Loop: receive a frame → hand it to the [`Router`]
//!   3. On disconnect, or once the outbox overflows: leave every room this
//!      connection joined

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use volley_protocol::{Codec, ServerMessage};
use volley_session::Outbox;
use volley_transport::Connection;

use crate::router::{ClientLink, Membership, leave_all};
use crate::{Router, VolleyError};

/// How long a closing handshake may take before the socket is simply
/// dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Drop guard that leaves the connection's rooms if the handler exits
/// without reaching its normal cleanup (a panic, or the task being
/// cancelled). Since `Drop` is synchronous, it spawns a fire-and-forget
/// task for the async leave.
struct DisconnectGuard<C: Codec> {
    link: ClientLink,
    router: Arc<Router<C>>,
}

impl<C: Codec> Drop for DisconnectGuard<C> {
    fn drop(&mut self) {
        let memberships: Vec<Membership> = self.link.take_memberships();
        if memberships.is_empty() {
            return;
        }
        let registry = Arc::clone(self.router.registry());
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move { leave_all(&registry, memberships).await });
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<T, C>(conn: T, router: Arc<Router<C>>) -> Result<(), VolleyError>
where
    T: Connection,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (outbox, outbound) = Outbox::channel();
    let writer = spawn_writer(Arc::clone(&conn), Arc::clone(&router), outbound);

    let mut guard = DisconnectGuard {
        link: ClientLink::new(outbox),
        router: Arc::clone(&router),
    };

    let overflow = guard.link.outbox().clone();
    loop {
        let received = tokio::select! {
            received = conn.recv() => received,
            _ = overflow.overflowed() => {
                tracing::warn!(%conn_id, "outbound queue full, dropping client");
                break;
            }
        };
        match received {
            Ok(Some(frame)) => router.handle_frame(&mut guard.link, frame).await,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        }
    }

    let rooms = guard.link.memberships().len();
    router.disconnect(&mut guard.link).await;
    tracing::debug!(%conn_id, rooms, "connection cleaned up");

    // A stalled peer may never accept the close frame either.
    writer.abort();
    match tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await {
        Ok(Err(e)) => tracing::trace!(%conn_id, error = %e, "close after disconnect"),
        Err(_) => tracing::debug!(%conn_id, "close timed out"),
        Ok(Ok(())) => {}
    }
    Ok(())
}

/// Writes everything queued on the outbox to the socket, in order.
///
/// Stops when the socket rejects a write or every outbox clone is gone.
fn spawn_writer<T, C>(
    conn: Arc<T>,
    router: Arc<Router<C>>,
    mut outbound: mpsc::Receiver<ServerMessage>,
) -> JoinHandle<()>
where
    T: Connection,
    C: Codec,
{
    tokio::spawn(async move {
        let conn_id = conn.id();
        while let Some(msg) = outbound.recv().await {
            let text = match router.codec().encode(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(%conn_id, error = %e, "failed to encode outbound message");
                    continue;
                }
            };
            if let Err(e) = conn.send(&text).await {
                tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
                break;
            }
        }
    })
}
