//! Codecs for serializing/deserializing messages.
//!
//! Two levels live here:
//!
//! - [`Codec`] converts any serde type to and from bytes. [`JsonCodec`] is
//!   the only implementation, matching what the chat server speaks.
//! - [`WireCodec`] sits on top of a `Codec` and knows the chat protocol:
//!   it turns an [`OutboundIntent`] into a frame and any inbound frame into
//!   an [`InboundEvent`]. It is the boundary where malformed server input
//!   stops: decoding never fails, bad frames become `InboundEvent::Unknown`.

use serde::{de::DeserializeOwned, Serialize};

use crate::types::WireInbound;
use crate::{ChatMessage, InboundEvent, OutboundIntent, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec lives inside the client's
/// event loop task for the lifetime of the client.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

// ---------------------------------------------------------------------------
// WireCodec
// ---------------------------------------------------------------------------

/// The chat protocol codec.
///
/// ## Example
///
/// ```rust
/// use chatline_protocol::{InboundEvent, WireCodec};
///
/// let codec = WireCodec::json();
/// let event = codec.decode(br#"{"type":"notification","message":"bob joined"}"#, 0);
/// assert_eq!(event, InboundEvent::Notification { text: "bob joined".into() });
///
/// // Garbage never errors, it just isn't understood.
/// let event = codec.decode(b"not json at all", 0);
/// assert!(matches!(event, InboundEvent::Unknown { .. }));
/// ```
#[derive(Debug, Clone, Default)]
pub struct WireCodec<C: Codec> {
    codec: C,
}

#[cfg(feature = "json")]
impl WireCodec<JsonCodec> {
    /// A wire codec speaking JSON.
    pub fn json() -> Self {
        Self::new(JsonCodec)
    }
}

impl<C: Codec> WireCodec<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Encodes an outbound intent into a frame.
    ///
    /// # Errors
    /// Only if the underlying codec fails, which for JSON and these types
    /// does not happen in practice.
    pub fn encode(&self, intent: &OutboundIntent) -> Result<Vec<u8>, ProtocolError> {
        self.codec.encode(intent)
    }

    /// Decodes an inbound frame.
    ///
    /// `received_at` (epoch millis) becomes the timestamp of chat messages
    /// that arrive without a usable one.
    pub fn decode(&self, data: &[u8], received_at: u64) -> InboundEvent {
        match self.codec.decode::<WireInbound>(data) {
            Ok(WireInbound::Message {
                username,
                content,
                timestamp,
            }) => {
                let timestamp = match timestamp.as_ref().map(|ts| ts.as_millis()) {
                    Some(Some(ms)) => ms,
                    Some(None) => {
                        tracing::debug!(
                            ?timestamp,
                            "unusable message timestamp, using receipt time"
                        );
                        received_at
                    }
                    None => received_at,
                };
                InboundEvent::ChatMessage(ChatMessage {
                    username,
                    content,
                    timestamp,
                })
            }
            Ok(WireInbound::Notification { message }) => {
                InboundEvent::Notification { text: message }
            }
            Err(e) => {
                let raw = String::from_utf8_lossy(data).into_owned();
                tracing::debug!(error = %e, %raw, "undecodable inbound frame");
                InboundEvent::Unknown { raw }
            }
        }
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{MessageContent, Username};

    const RECEIVED_AT: u64 = 42_000;

    fn decode(json: &str) -> InboundEvent {
        WireCodec::json().decode(json.as_bytes(), RECEIVED_AT)
    }

    #[test]
    fn test_encode_join() {
        let bytes = WireCodec::json()
            .encode(&OutboundIntent::Join {
                username: Username::parse("Alice").unwrap(),
            })
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({"type": "join", "username": "Alice"}));
    }

    #[test]
    fn test_encode_send() {
        let bytes = WireCodec::json()
            .encode(&OutboundIntent::Send {
                content: MessageContent::parse("hello").unwrap(),
            })
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({"type": "message", "content": "hello"}));
    }

    #[test]
    fn test_decode_chat_message_keeps_fields() {
        let event = decode(r#"{"type":"message","username":"Bob","content":"hi","timestamp":1000}"#);
        assert_eq!(
            event,
            InboundEvent::ChatMessage(ChatMessage {
                username: "Bob".into(),
                content: "hi".into(),
                timestamp: 1000,
            })
        );
    }

    #[test]
    fn test_decode_chat_message_without_timestamp_uses_receipt_time() {
        let event = decode(r#"{"type":"message","username":"Bob","content":"hi"}"#);
        let InboundEvent::ChatMessage(msg) = event else {
            panic!("expected chat message, got {event:?}");
        };
        assert_eq!(msg.timestamp, RECEIVED_AT);
    }

    #[test]
    fn test_decode_chat_message_with_null_timestamp_uses_receipt_time() {
        let event = decode(r#"{"type":"message","username":"Bob","content":"hi","timestamp":null}"#);
        let InboundEvent::ChatMessage(msg) = event else {
            panic!("expected chat message, got {event:?}");
        };
        assert_eq!(msg.timestamp, RECEIVED_AT);
    }

    #[test]
    fn test_decode_chat_message_with_date_string_uses_receipt_time() {
        let event = decode(
            r#"{"type":"message","username":"Bob","content":"hi","timestamp":"2024-05-01T10:00:00"}"#,
        );
        let InboundEvent::ChatMessage(msg) = event else {
            panic!("expected chat message, got {event:?}");
        };
        assert_eq!(msg.timestamp, RECEIVED_AT);
    }

    #[test]
    fn test_decode_notification_reads_message_field() {
        let event = decode(r#"{"type":"notification","message":"Alice joined"}"#);
        assert_eq!(event, InboundEvent::Notification { text: "Alice joined".into() });
    }

    #[test]
    fn test_decode_malformed_json_is_unknown() {
        let event = decode("{not json");
        assert_eq!(event, InboundEvent::Unknown { raw: "{not json".into() });
    }

    #[test]
    fn test_decode_missing_type_is_unknown() {
        let event = decode(r#"{"username":"Bob","content":"hi"}"#);
        assert!(matches!(event, InboundEvent::Unknown { .. }));
    }

    #[test]
    fn test_decode_unrecognized_type_is_unknown() {
        let event = decode(r#"{"type":"typing","username":"Bob"}"#);
        assert!(matches!(event, InboundEvent::Unknown { .. }));
    }

    #[test]
    fn test_decode_message_missing_content_is_unknown() {
        let event = decode(r#"{"type":"message","username":"Bob"}"#);
        assert!(matches!(event, InboundEvent::Unknown { .. }));
    }

    #[test]
    fn test_decode_non_utf8_is_unknown() {
        let event = WireCodec::json().decode(&[0xff, 0xfe, 0x00], RECEIVED_AT);
        assert!(matches!(event, InboundEvent::Unknown { .. }));
    }

    #[test]
    fn test_json_codec_decode_error_surfaces_directly() {
        let result: Result<serde_json::Value, _> = JsonCodec.decode(b"nope");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
