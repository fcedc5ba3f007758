//! Unified error type for Lanyard.

use lanyard_lobby::LobbyError;
use lanyard_protocol::ProtocolError;
use lanyard_session::{AuthError, ConnectionError, MessageError, SessionError};
use lanyard_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// With the `lanyard` crate you deal with this one type instead of
/// importing errors from each layer; `?` converts automatically.
#[derive(Debug, thiserror::Error)]
pub enum LanyardError {
    /// A transport-level error (connect, send, link failure).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unassigned kind).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (connection, authentication, message).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A lobby request error.
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}

impl LanyardError {
    /// `true` if this error ended a connection attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LanyardError::Session(e) if e.is_terminal())
    }
}

// The session's narrower errors go through `SessionError`, so callers can
// `?` straight out of `connect` or `send_data`.

impl From<ConnectionError> for LanyardError {
    fn from(err: ConnectionError) -> Self {
        LanyardError::Session(err.into())
    }
}

impl From<AuthError> for LanyardError {
    fn from(err: AuthError) -> Self {
        LanyardError::Session(err.into())
    }
}

impl From<MessageError> for LanyardError {
    fn from(err: MessageError) -> Self {
        LanyardError::Session(err.into())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let lanyard_err: LanyardError = err.into();
        assert!(matches!(lanyard_err, LanyardError::Transport(_)));
        assert!(lanyard_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let lanyard_err: LanyardError = err.into();
        assert!(matches!(lanyard_err, LanyardError::Protocol(_)));
    }

    #[test]
    fn test_from_lobby_error() {
        let lanyard_err: LanyardError = LobbyError::CreationInProgress.into();
        assert!(matches!(
            lanyard_err,
            LanyardError::Lobby(LobbyError::CreationInProgress)
        ));
        assert!(!lanyard_err.is_terminal());
    }

    #[test]
    fn test_from_connection_error_goes_through_session() {
        let lanyard_err: LanyardError = ConnectionError::AlreadyConnected.into();
        assert!(matches!(
            lanyard_err,
            LanyardError::Session(SessionError::Connection(ConnectionError::AlreadyConnected))
        ));
        assert!(lanyard_err.is_terminal());
    }

    #[test]
    fn test_from_auth_error_is_terminal() {
        let lanyard_err: LanyardError = AuthError::AuthTimeout(Duration::from_secs(10)).into();
        assert!(matches!(lanyard_err, LanyardError::Session(SessionError::Auth(_))));
        assert!(lanyard_err.is_terminal());
    }

    #[test]
    fn test_from_message_error_is_not_terminal() {
        let lanyard_err: LanyardError = MessageError::NotConnected.into();
        assert!(matches!(lanyard_err, LanyardError::Session(SessionError::Message(_))));
        assert!(!lanyard_err.is_terminal());
    }
}
