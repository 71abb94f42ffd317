//! Wire protocol for Chatline.
//!
//! This crate defines the "language" that the chat client and server speak:
//!
//! - **Types** ([`OutboundIntent`], [`InboundEvent`], [`ChatMessage`]):
//!   the messages that travel on the wire.
//! - **Validation** ([`Username`], [`MessageContent`]): user input is
//!   checked here, before any network action.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`], [`WireCodec`]): how those
//!   messages are converted to/from bytes.
//! - **Errors** ([`ProtocolError`], [`ValidationError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the client
//! core (connection state and dispatch). It knows nothing about sockets or
//! reconnection.
//!
//! ```text
//! Transport (bytes) → Protocol (InboundEvent) → Client (router, handlers)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, WireCodec};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{ProtocolError, ValidationError};
pub use types::{
    ChatMessage, InboundEvent, MessageContent, OutboundIntent, Username,
};
