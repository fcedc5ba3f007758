//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust values and raw bytes.
//! It is used twice per message: once for the payload (a
//! [`PlayerData`](crate::PlayerData), an
//! [`AuthResultMessage`](crate::AuthResultMessage), ...) and once for the
//! [`MessageEnvelope`](crate::MessageEnvelope) wrapping it. Client and host
//! must agree on the codec; nothing else in the stack cares which one it is.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust values to bytes and decode bytes back.
///
/// `Send + Sync + 'static` keeps a codec usable from the WebSocket
/// transport's Tokio tasks as well as from the frame thread.
///
/// The methods are generic, so `Codec` is used as a type parameter
/// (`Session<T, I, C: Codec>`) rather than as a trait object.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented
    /// in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// `DeserializeOwned` means the result owns its data, so the receive
    /// buffer can be dropped right after decoding.
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
/// Readable in packet captures and in the session's diagnostic log, at
/// the cost of size. Behind the `json` feature (enabled by default).
///
/// ## Example
///
/// ```rust
/// use lanyard_protocol::{
///     AuthResultMessage, Codec, JsonCodec, MessageEnvelope, MessageKind,
/// };
///
/// let codec = JsonCodec;
///
/// let envelope = MessageEnvelope::encode(
///     &codec,
///     MessageKind::AuthResult,
///     &AuthResultMessage::accept(),
/// )
/// .unwrap();
///
/// let bytes = envelope.to_bytes(&codec).unwrap();
/// let decoded = MessageEnvelope::from_bytes(&codec, &bytes).unwrap();
/// assert_eq!(envelope, decoded);
///
/// let result: AuthResultMessage = decoded.decode_payload(&codec).unwrap();
/// assert!(result.accepted);
/// ```
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
