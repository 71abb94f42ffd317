//! # Chatline
//!
//! Client core for a real-time group chat.
//!
//! Chatline keeps one live connection to a chat server, re-establishes it
//! with exponential backoff when it drops, and hands every inbound chat line
//! or notification to your presentation code. You implement two traits:
//! [`RenderHandler`] (what arrived) and [`ConnectionObserver`] (connected,
//! disconnected, ready, gave up). Everything else is handled here.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatline::prelude::*;
//!
//! struct Printer;
//!
//! impl RenderHandler for Printer {
//!     fn render_message(&mut self, m: &ChatMessage) {
//!         println!("{}: {}", m.username, m.content);
//!     }
//!     fn render_notification(&mut self, text: &str) {
//!         println!("* {text}");
//!     }
//! }
//!
//! struct Status;
//!
//! impl ConnectionObserver for Status {
//!     fn connectivity_changed(&mut self, connected: bool) {
//!         println!("connected: {connected}");
//!     }
//!     fn reconnect_exhausted(&mut self, error: &ChatError) {
//!         eprintln!("{error}");
//!     }
//! }
//!
//! # async fn demo() -> Result<(), ChatError> {
//! let mut client = ChatClient::builder()
//!     .server_url("http://localhost:8080")?
//!     .build(Printer, Status)?;
//! client.join("alice").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod manager;
mod router;

pub use client::{ChatClient, ChatClientBuilder};
pub use config::{ClientConfig, DEFAULT_SERVER_URL, DEFAULT_WS_PORT};
pub use error::ChatError;
pub use manager::{ConnectionManager, ConnectionObserver, ConnectionState, TimerKind};
pub use router::{MessageRouter, RenderHandler};

pub use chatline_protocol::{
    ChatMessage, InboundEvent, MessageContent, OutboundIntent, Username, ValidationError,
};
pub use chatline_session::{ServerStats, SessionError, SessionId, StatsClient};
pub use chatline_timer::ReconnectConfig;

/// Everything an embedding application usually needs.
pub mod prelude {
    pub use crate::{
        ChatClient, ChatError, ChatMessage, ConnectionObserver, ConnectionState,
        ReconnectConfig, RenderHandler, ServerStats, SessionId, StatsClient, Username,
    };
}
