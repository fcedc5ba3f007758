//! Wire protocol for Lanyard.
//!
//! This crate defines what a client and a host say to each other once a
//! link is up:
//!
//! - **Types** ([`MessageEnvelope`], [`MessageKind`], [`PlayerData`], ...):
//!   the tagged-message shape and the built-in payloads.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those values are
//!   turned into bytes and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong doing that.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and session
//! (connection state). It knows nothing about links or handshakes.
//!
//! ```text
//! Transport (bytes) → Protocol (MessageEnvelope) → Session (state machine)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AuthResultMessage, AuthTicketMessage, CustomKind, MessageEnvelope,
    MessageKind, PlayerData, PlayerId,
};
