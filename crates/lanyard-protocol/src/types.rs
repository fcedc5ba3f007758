//! Core protocol types for Lanyard's wire format.
//!
//! Every message exchanged after a link is up is a [`MessageEnvelope`]:
//! a [`MessageKind`] tag plus opaque payload bytes. The payload layout is
//! decided by the kind; this module defines the built-in ones
//! ([`AuthTicketMessage`], [`AuthResultMessage`], [`PlayerData`]); host
//! applications define their own under [`MessageKind::Custom`].

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Codec, ProtocolError};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A unique identifier for a player (one controllable entity).
///
/// `#[serde(transparent)]` makes `PlayerId(42)` serialize as plain `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// A host-application message kind.
///
/// The inner code is private so a `CustomKind` can only be built through
/// [`CustomKind::new`], which keeps it out of the reserved range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CustomKind(u16);

impl CustomKind {
    /// Lowest code available to host applications. Everything below is
    /// reserved for built-in kinds.
    pub const FIRST: u16 = 0x0100;

    /// Creates a custom kind from its wire code.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] if `code` falls inside
    /// the reserved range.
    pub fn new(code: u16) -> Result<Self, ProtocolError> {
        if code < Self::FIRST {
            return Err(ProtocolError::InvalidMessage(format!(
                "custom kind {code:#06x} is inside the reserved range"
            )));
        }
        Ok(Self(code))
    }

    /// The wire code.
    pub fn code(self) -> u16 {
        self.0
    }
}

/// The tag on every envelope. A closed, versioned enumeration shared by
/// client and host.
///
/// On the wire a kind is a plain `u16`:
///
/// | code | kind |
/// |---|---|
/// | `0x0001` | [`AuthTicket`](Self::AuthTicket) |
/// | `0x0002` | [`AuthResult`](Self::AuthResult) |
/// | `0x0003` | [`PlayerData`](Self::PlayerData) |
/// | `0x0004` | [`HostExiting`](Self::HostExiting) |
/// | `0x0005..=0x00FF` | reserved |
/// | `0x0100..` | [`Custom`](Self::Custom) |
///
/// `#[serde(into = "u16", try_from = "u16")]` routes serde through the
/// `From`/`TryFrom` impls below, so an unassigned code fails to
/// deserialize instead of silently mapping to something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum MessageKind {
    /// Client → host: the credential ticket, first message on a new link.
    AuthTicket,
    /// Host → client: accept or reject the ticket.
    AuthResult,
    /// Either direction: one entity's state snapshot.
    PlayerData,
    /// Host → client: the host is shutting down; the link is going away.
    HostExiting,
    /// A kind defined by the host application.
    Custom(CustomKind),
}

impl MessageKind {
    /// The wire code for this kind.
    pub fn code(self) -> u16 {
        match self {
            MessageKind::AuthTicket => 0x0001,
            MessageKind::AuthResult => 0x0002,
            MessageKind::PlayerData => 0x0003,
            MessageKind::HostExiting => 0x0004,
            MessageKind::Custom(custom) => custom.code(),
        }
    }

    /// Looks a wire code up.
    ///
    /// # Errors
    /// Returns [`ProtocolError::UnknownKind`] for reserved, unassigned codes.
    pub fn from_code(code: u16) -> Result<Self, ProtocolError> {
        match code {
            0x0001 => Ok(MessageKind::AuthTicket),
            0x0002 => Ok(MessageKind::AuthResult),
            0x0003 => Ok(MessageKind::PlayerData),
            0x0004 => Ok(MessageKind::HostExiting),
            c if c >= CustomKind::FIRST => Ok(MessageKind::Custom(CustomKind(c))),
            c => Err(ProtocolError::UnknownKind(c)),
        }
    }

    /// Shorthand for `MessageKind::Custom(CustomKind::new(code)?)`.
    pub fn custom(code: u16) -> Result<Self, ProtocolError> {
        CustomKind::new(code).map(MessageKind::Custom)
    }

    /// `true` for every kind except [`Custom`](Self::Custom).
    pub fn is_builtin(self) -> bool {
        !matches!(self, MessageKind::Custom(_))
    }
}

impl From<MessageKind> for u16 {
    fn from(kind: MessageKind) -> u16 {
        kind.code()
    }
}

impl TryFrom<u16> for MessageKind {
    type Error = ProtocolError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        MessageKind::from_code(code)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::AuthTicket => f.write_str("AuthTicket"),
            MessageKind::AuthResult => f.write_str("AuthResult"),
            MessageKind::PlayerData => f.write_str("PlayerData"),
            MessageKind::HostExiting => f.write_str("HostExiting"),
            MessageKind::Custom(c) => write!(f, "Custom({:#06x})", c.code()),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level message wrapper. Every message on the wire is one.
///
/// ```text
/// ┌──────────────────────────────┐
/// │ kind: PlayerData (0x0003)    │  ← how to read the payload
/// │ ┌──────────────────────────┐ │
/// │ │ payload: [...bytes...]   │ │  ← codec-encoded payload
/// │ └──────────────────────────┘ │
/// └──────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageEnvelope {
    /// What the payload is.
    pub kind: MessageKind,
    /// The encoded payload. Empty for kinds that carry no data.
    pub payload: Vec<u8>,
}

/// Receive-side shape: the kind stays a raw code until the envelope
/// itself has parsed, so an unassigned code can be reported as such.
#[derive(Deserialize)]
struct WireEnvelope {
    kind: u16,
    #[serde(default)]
    payload: Vec<u8>,
}

impl MessageEnvelope {
    /// Wraps already-encoded payload bytes.
    pub fn new(kind: MessageKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// An envelope that carries no payload (e.g. `HostExiting`).
    pub fn empty(kind: MessageKind) -> Self {
        Self::new(kind, Vec::new())
    }

    /// Encodes `value` with `codec` and wraps it.
    pub fn encode<C: Codec, T: Serialize>(
        codec: &C,
        kind: MessageKind,
        value: &T,
    ) -> Result<Self, ProtocolError> {
        Ok(Self::new(kind, codec.encode(value)?))
    }

    /// Decodes the payload as `T`.
    pub fn decode_payload<C: Codec, T: DeserializeOwned>(
        &self,
        codec: &C,
    ) -> Result<T, ProtocolError> {
        codec.decode(&self.payload)
    }

    /// Encodes the whole envelope for the transport.
    pub fn to_bytes<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, ProtocolError> {
        codec.encode(self)
    }

    /// Decodes an envelope received from the transport.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownKind`]: the envelope parsed but its kind
    ///   code is unassigned
    /// - [`ProtocolError::Decode`]: the bytes aren't an envelope at all
    pub fn from_bytes<C: Codec>(codec: &C, data: &[u8]) -> Result<Self, ProtocolError> {
        let wire: WireEnvelope = codec.decode(data)?;
        Ok(Self {
            kind: MessageKind::from_code(wire.kind)?,
            payload: wire.payload,
        })
    }
}

// ---------------------------------------------------------------------------
// Built-in payloads
// ---------------------------------------------------------------------------

/// Payload of [`MessageKind::AuthTicket`].
///
/// The ticket bytes are opaque to both the client session and this
/// crate; only the host's identity backend can validate them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTicketMessage {
    /// Raw ticket as issued by the identity provider.
    pub ticket: Vec<u8>,
}

/// Payload of [`MessageKind::AuthResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResultMessage {
    /// `true` if the host accepted the ticket.
    pub accepted: bool,
    /// Why the ticket was rejected, when the host says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuthResultMessage {
    /// An accepting result.
    pub fn accept() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    /// A rejecting result with a reason.
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

/// Payload of [`MessageKind::PlayerData`]: one entity's state snapshot.
///
/// A snapshot is absolute, not a delta. Applying the same one twice
/// leaves the entity exactly as applying it once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    /// Which entity this snapshot describes.
    pub player: PlayerId,
    /// World position `[x, y, z]`.
    pub position: [f32; 3],
    /// Orientation quaternion `[x, y, z, w]`.
    pub orientation: [f32; 4],
    /// Input state, one bit per button.
    pub buttons: u32,
}

impl PlayerData {
    /// A snapshot at the origin, identity orientation, nothing pressed.
    pub fn at_rest(player: PlayerId) -> Self {
        Self {
            player,
            position: [0.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
            buttons: 0,
        }
    }

    /// Whether button `bit` (0–31) is held.
    pub fn is_pressed(&self, bit: u8) -> bool {
        bit < 32 && self.buttons & (1 << bit) != 0
    }
}

// =========================================================================
// Tests
// =========================================================================
