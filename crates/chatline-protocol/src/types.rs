//! Core protocol types for Chatline's wire format.
//!
//! Outbound traffic is described by [`OutboundIntent`], inbound traffic by
//! [`InboundEvent`]. The two directions use different shapes on the wire
//! (the server adds `username` and `timestamp` to chat messages), so they
//! are separate types rather than one symmetric enum.
//!
//! User-typed text only reaches an `OutboundIntent` through the validated
//! newtypes [`Username`] and [`MessageContent`], so an intent that exists
//! is an intent the server will accept.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

// ---------------------------------------------------------------------------
// Validated input
// ---------------------------------------------------------------------------

/// A chat username, validated once at join time.
///
/// This is a "newtype wrapper" around `String`. The only ways to build one
/// are [`Username::parse`] and deserialization (which calls `parse` via
/// `#[serde(try_from = "String")]`), so holding a `Username` proves the
/// value passed validation:
///
/// - surrounding whitespace is trimmed,
/// - 2 to 20 characters,
/// - only ASCII letters, digits, `_`, `-` and spaces.
///
/// `#[serde(into = "String")]` makes it serialize as a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Minimum length in characters.
    pub const MIN_LEN: usize = 2;
    /// Maximum length in characters.
    pub const MAX_LEN: usize = 20;

    /// Validates raw user input.
    ///
    /// # Errors
    /// Returns the first [`ValidationError`] the input violates.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let name = raw.trim();
        let len = name.chars().count();
        if len < Self::MIN_LEN {
            return Err(ValidationError::UsernameTooShort {
                len,
                min: Self::MIN_LEN,
            });
        }
        if len > Self::MAX_LEN {
            return Err(ValidationError::UsernameTooLong {
                len,
                max: Self::MAX_LEN,
            });
        }
        if let Some(bad) = name.chars().find(|c| !is_username_char(*c)) {
            return Err(ValidationError::UsernameInvalidChar(bad));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' ')
}

impl TryFrom<String> for Username {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The body of an outgoing chat message: trimmed, 1 to 500 characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageContent(String);

impl MessageContent {
    /// Maximum length in characters.
    pub const MAX_LEN: usize = 500;

    /// Validates raw user input.
    ///
    /// # Errors
    /// [`ValidationError::MessageEmpty`] or [`ValidationError::MessageTooLong`].
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let content = raw.trim();
        if content.is_empty() {
            return Err(ValidationError::MessageEmpty);
        }
        let len = content.chars().count();
        if len > Self::MAX_LEN {
            return Err(ValidationError::MessageTooLong {
                len,
                max: Self::MAX_LEN,
            });
        }
        Ok(Self(content.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MessageContent> for String {
    fn from(value: MessageContent) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A caller-originated action awaiting encoding and transmission.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, which is the
/// shape the chat server reads:
///   `{ "type": "join", "username": "alice" }`
///   `{ "type": "message", "content": "hello" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundIntent {
    /// "I am here, call me `username`." Sent once per established connection.
    #[serde(rename = "join")]
    Join { username: Username },

    /// A chat line for everyone in the room.
    #[serde(rename = "message")]
    Send { content: MessageContent },
}

impl OutboundIntent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Send { .. } => "message",
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A chat line relayed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Who wrote it. Not validated: the server is the authority here.
    pub username: String,
    pub content: String,
    /// Milliseconds since the Unix epoch. Taken from the server when it
    /// sends one, otherwise the time the frame was received.
    pub timestamp: u64,
}

impl ChatMessage {
    /// Whether `user` wrote this message.
    pub fn is_from(&self, user: &Username) -> bool {
        self.username == user.as_str()
    }
}

/// A decoded, typed inbound occurrence ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    ChatMessage(ChatMessage),
    /// Server-generated text such as "alice joined".
    Notification { text: String },
    /// Anything that did not decode. `raw` is the frame, lossily as UTF-8.
    Unknown { raw: String },
}

/// Inbound wire shape. Private: the rest of the system sees [`InboundEvent`].
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum WireInbound {
    #[serde(rename = "message")]
    Message {
        username: String,
        content: String,
        #[serde(default)]
        timestamp: Option<WireTimestamp>,
    },
    #[serde(rename = "notification")]
    Notification { message: String },
}

/// Servers disagree on how to send timestamps: epoch millis as an integer,
/// as a float, or as a string.
///
/// `#[serde(untagged)]` tries each variant in order until one fits.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireTimestamp {
    Millis(u64),
    Float(f64),
    Text(String),
}

impl WireTimestamp {
    /// Epoch millis, or `None` when the value is not a usable number.
    pub(crate) fn as_millis(&self) -> Option<u64> {
        match self {
            Self::Millis(ms) => Some(*ms),
            Self::Float(ms) if ms.is_finite() && *ms >= 0.0 => Some(*ms as u64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
