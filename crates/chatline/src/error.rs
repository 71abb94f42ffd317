//! Unified error type for the Chatline client.

use chatline_protocol::{ProtocolError, ValidationError};
use chatline_session::SessionError;
use chatline_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapping variant generates a `From`
/// impl, so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Bad username or message content. Nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A send was attempted while the connection is not open.
    #[error("not connected")]
    NotConnected,

    /// Every reconnect attempt failed; only a manual restart helps now.
    #[error("could not reconnect after {attempts} attempts, restart the client")]
    ReconnectExhausted { attempts: u32 },

    /// A transport-level error (the connection task is gone).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode failed).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An HTTP API error (stats, or building the HTTP client).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The client configuration cannot be used.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The client's event loop has stopped.
    #[error("chat client has stopped")]
    ClientStopped,
}
