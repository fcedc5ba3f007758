//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means "these bytes could not become (or come
//! from) a message". Whether that is fatal is decided further up: the
//! session drops the single offending envelope and carries on.

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed bytes, missing fields, wrong
    /// shapes, or a truncated message.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope names a kind code this build doesn't know.
    ///
    /// Kept apart from `Decode` so the router can report it as an
    /// unknown kind rather than a malformed payload.
    #[error("unknown message kind {0:#06x}")]
    UnknownKind(u16),

    /// The message decoded but breaks a protocol rule
    /// (e.g. a custom kind code inside the reserved range).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
