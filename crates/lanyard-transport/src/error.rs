use crate::ConnectionHandle;

/// Failures reported by a [`ClientTransport`](crate::ClientTransport),
/// either returned directly or carried by a `LinkError` event.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The link was closed, locally or by the remote end.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Opening a link to the target failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Writing a message to the link failed.
    #[error("link write failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading from the link failed.
    #[error("link read failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The handle does not name a link this transport owns.
    #[error("unknown connection {0}")]
    UnknownHandle(ConnectionHandle),

    /// The transport (or the runtime driving it) is gone.
    #[error("transport shut down")]
    Shutdown,
}
