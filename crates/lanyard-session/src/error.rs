//! Error types for the session layer.
//!
//! The taxonomy follows what the caller has to do about each error:
//!
//! - [`ConnectionError`] / [`AuthError`]: the attempt is over. The
//!   session is back in `NotConnected` and the host application decides
//!   whether to connect again.
//! - [`MessageError`]: one message was rejected. On receive the envelope
//!   is dropped and logged; on send the call fails and nothing was sent.
//!   Either way the session state is untouched.

use std::time::Duration;

use lanyard_protocol::{MessageKind, ProtocolError};
use lanyard_transport::{ConnectionHandle, TransportError};

/// Why a connection attempt ended (or could not start).
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// `connect` was called while an attempt is still in progress.
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,

    /// `connect` was called while already authenticated.
    #[error("already connected")]
    AlreadyConnected,

    /// The link went away (remote closed, host exiting, I/O failure).
    #[error("link lost: {0}")]
    LinkLost(String),

    /// The transport didn't establish the link in time.
    #[error("link not established within {0:?}")]
    LinkTimeout(Duration),

    /// The transport refused or failed to open the link.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] TransportError),
}

/// Why the authentication handshake failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The identity provider couldn't issue a ticket.
    #[error("no auth ticket available: {0}")]
    TicketUnavailable(String),

    /// The host rejected the ticket.
    #[error("authentication rejected: {}", .reason.as_deref().unwrap_or("no reason given"))]
    AuthRejected {
        /// The host's explanation, if it sent one.
        reason: Option<String>,
    },

    /// No `AuthResult` arrived in time.
    #[error("no authentication result within {0:?}")]
    AuthTimeout(Duration),
}

/// Why a single message was rejected.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The encoded envelope is larger than the transport accepts.
    #[error("message of {size} bytes exceeds the transport limit of {max}")]
    SizeExceeded {
        /// Encoded size.
        size: usize,
        /// `ClientTransport::max_message_size()`.
        max: usize,
    },

    /// No handler for this kind code.
    #[error("unknown message kind {0:#06x}")]
    UnknownKind(u16),

    /// The envelope or its payload couldn't be decoded (or encoded).
    #[error("malformed payload: {0}")]
    MalformedPayload(#[source] ProtocolError),

    /// Sending requires a link in `PendingAuthentication` or
    /// `Authenticated`.
    #[error("not connected")]
    NotConnected,

    /// Built-in kinds are routed internally and can't be re-registered.
    #[error("message kind {0} is handled by the session itself")]
    ReservedKind(MessageKind),

    /// Data claimed to come from a link that isn't authenticated.
    #[error("{0} is not an authenticated peer")]
    UnauthenticatedSource(ConnectionHandle),

    /// The transport refused the send.
    #[error("send failed: {0}")]
    SendFailed(#[source] TransportError),
}

/// Any error the session layer reports.
///
/// `#[from]` lets `?` lift each specific error into this one.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// See [`ConnectionError`].
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// See [`AuthError`].
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// See [`MessageError`].
    #[error(transparent)]
    Message(#[from] MessageError),
}

impl SessionError {
    /// `true` if this error ended the connection attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionError::Message(_))
    }
}
