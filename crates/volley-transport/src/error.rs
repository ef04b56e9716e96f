/// Socket-level failures. None of them is fatal to the server: the
/// affected connection is dropped and everything else carries on.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer hung up mid-operation.
    #[error("peer closed the connection: {0}")]
    ConnectionClosed(String),

    /// Writing a frame failed.
    #[error("could not write frame: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading a frame failed.
    #[error("could not read frame: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or completing the upgrade failed.
    #[error("could not accept client: {0}")]
    AcceptFailed(#[source] std::io::Error),
}
