/// Errors that can occur in the transport layer.
///
/// Every variant carries a rendered message instead of the underlying
/// error so the value can be cloned and fanned out to every data-stream
/// subscriber.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed (DNS, TCP, or WebSocket handshake).
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The connection was closed abnormally by the peer.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// `connect` was called on a channel that is already running.
    #[error("channel already started")]
    AlreadyStarted,

    /// The channel was shut down.
    #[error("transport shut down")]
    Shutdown,
}
