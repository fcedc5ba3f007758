//! Client session management for Lanyard.
//!
//! This crate takes a client from "I want to play on that host" to
//! "authenticated and exchanging player state":
//!
//! 1. **Connection state machine**: one link at a time, driven through
//!    [`ConnectionState`] by [`Session`]
//! 2. **Authentication**: ticket issue/revoke behind [`IdentityProvider`],
//!    the exchange itself in [`Handshake`]
//! 3. **Routing**: received envelopes dispatched by kind
//!    ([`MessageRouter`]), player snapshots applied to an [`EntitySink`]
//! 4. **Diagnostics**: every envelope in or out reported to a
//!    [`DiagnosticSink`]
//!
//! # How it fits in the stack
//!
//! ```text
//! Frame loop (above)  ← lanyard-tick drives one Session per frame
//!     ↕
//! Session layer (this crate)  ← link state, auth, routing
//!     ↕
//! Protocol (below)  ← MessageEnvelope, MessageKind, PlayerData
//!     ↕
//! Transport (below)  ← ClientTransport: bytes and link events
//! ```
//!
//! Nothing here blocks or spawns. The only clock read is in `connect`,
//! which stamps the start of the link timeout; `connect_at` takes the
//! instant from the caller instead.

mod auth;
mod connection;
mod diagnostics;
mod error;
mod handshake;
mod router;
mod state;

pub use auth::{AuthTicket, IdentityProvider, LocalTicketIssuer, TicketId};
pub use connection::{Inbound, Session};
pub use diagnostics::{DiagnosticEntry, DiagnosticSink, Direction, MessageLog, TracingSink};
pub use error::{AuthError, ConnectionError, MessageError, SessionError};
pub use handshake::Handshake;
pub use router::{
    EntitySink, MessageHandler, MessageRouter, Origin, handle_player_data, send_player_data,
};
pub use state::{ConnectionState, SessionConfig};
