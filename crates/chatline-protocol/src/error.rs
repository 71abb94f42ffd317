//! Error types for the protocol layer.
//!
//! Each crate in Chatline defines its own error enum. A `ProtocolError`
//! means serialization went wrong; a `ValidationError` means the user typed
//! something the protocol refuses to carry. Neither is a networking problem.

/// Errors that can occur while encoding or decoding wire messages.
///
/// Inbound decode failures never leave this crate as errors: the
/// [`WireCodec`](crate::WireCodec) turns them into
/// [`InboundEvent::Unknown`](crate::InboundEvent::Unknown). The `Decode`
/// variant exists for callers that use a [`Codec`](crate::Codec) directly.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, a missing `type` field, or a `type`
    /// this client does not understand.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}

/// User input rejected before anything touches the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The username has fewer characters than allowed.
    #[error("username must be at least {min} characters (got {len})")]
    UsernameTooShort { len: usize, min: usize },

    /// The username has more characters than allowed.
    #[error("username must be at most {max} characters (got {len})")]
    UsernameTooLong { len: usize, max: usize },

    /// The username contains a character outside letters, digits,
    /// underscore, hyphen and space.
    #[error("username may only contain letters, digits, '_', '-' and spaces (found {0:?})")]
    UsernameInvalidChar(char),

    /// The message is empty after trimming.
    #[error("message must not be empty")]
    MessageEmpty,

    /// The message has more characters than allowed.
    #[error("message must be at most {max} characters (got {len})")]
    MessageTooLong { len: usize, max: usize },
}
