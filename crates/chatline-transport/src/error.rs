/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed, so the frame could not be queued.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Opening the connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}
