//! Client transport abstraction layer for Chatline.
//!
//! Provides the [`Connector`] and [`TransportHandle`] traits that abstract
//! over how the live connection to the chat server is opened and driven.
//!
//! A connector never calls back into the client directly. Everything the
//! connection observes (open, inbound frame, close, failure) is pushed as a
//! [`TransportEvent`] into a channel owned by the client's event loop, tagged
//! with the [`Generation`] of the handle that produced it. The loop compares
//! that generation with its current one and drops anything stale.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket connector via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnector, WebSocketHandle};

use std::fmt;

use tokio::sync::mpsc;

/// Identity of one transport handle.
///
/// Every connection attempt gets a fresh, strictly larger generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// Creates a new `Generation` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the generation that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// What happened on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// The connection is established and can carry frames.
    Opened,
    /// A frame arrived from the server.
    Message(Vec<u8>),
    /// The connection ended. `reason` is the close reason, if the peer sent one.
    Closed { reason: Option<String> },
    /// The connection could not be opened or broke mid-stream.
    Failed(String),
}

impl TransportEventKind {
    /// Whether this event ends the connection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed { .. } | Self::Failed(_))
    }
}

/// A transport occurrence, tagged with the handle that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub generation: Generation,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(generation: Generation, kind: TransportEventKind) -> Self {
        Self { generation, kind }
    }
}

/// Sending half of the channel transports report into.
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// Opens live connections to the chat server.
pub trait Connector: Send + 'static {
    /// The handle type produced by this connector.
    type Handle: TransportHandle;

    /// Starts opening a connection to `url`.
    ///
    /// Returns immediately. Progress is reported through `events`: first
    /// [`TransportEventKind::Opened`] (or `Failed`), then any number of
    /// `Message`s, then exactly one terminal event.
    fn open(
        &mut self,
        url: &str,
        generation: Generation,
        events: EventSink,
    ) -> Self::Handle;
}

/// The owning side of one live connection.
///
/// Dropping the handle closes the connection.
pub trait TransportHandle: Send + 'static {
    /// Queues a frame for sending. Never waits on the network.
    fn send(&self, data: Vec<u8>) -> Result<(), TransportError>;

    /// Asks the connection to close. Idempotent.
    fn close(&self);

    /// The generation this handle was opened with.
    fn generation(&self) -> Generation;
}
