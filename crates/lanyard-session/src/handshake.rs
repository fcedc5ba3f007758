//! The client half of the authentication handshake.
//!
//! ```text
//!   Client                                  Host
//!     │── AuthTicket { ticket } ─────────────→│
//!     │                                       │ validate with backend
//!     │←──────────── AuthResult { accepted } ─│
//! ```
//!
//! A [`Handshake`] exists only while the session is in
//! `PendingAuthentication`. It owns the ticket that was sent; when the
//! handshake ends the ticket either moves into the authenticated link or
//! goes back to the identity provider.

use std::time::{Duration, Instant};

use lanyard_protocol::{
    AuthResultMessage, AuthTicketMessage, Codec, MessageEnvelope, MessageKind,
};
use lanyard_transport::{Channel, ClientTransport, ConnectionHandle};

use crate::diagnostics::{DiagnosticEntry, DiagnosticSink, Direction};
use crate::{
    AuthError, AuthTicket, ConnectionError, IdentityProvider, SessionConfig, SessionError,
};

/// An auth ticket in flight, waiting for the host's verdict.
#[derive(Debug)]
pub struct Handshake {
    handle: ConnectionHandle,
    ticket: AuthTicket,
    timeout: Duration,
    deadline: Instant,
}

impl Handshake {
    /// Issues a ticket and sends it to the host on `handle`.
    ///
    /// The ticket goes out on the reliable ordered channel. On any
    /// failure after issuing, the ticket is revoked before returning.
    ///
    /// # Errors
    /// - [`AuthError::TicketUnavailable`]: the provider had no ticket, or
    ///   the ticket couldn't be encoded
    /// - [`ConnectionError::LinkLost`]: the transport refused the send
    pub fn begin<T, I, C>(
        transport: &mut T,
        identity: &mut I,
        codec: &C,
        diagnostics: &mut dyn DiagnosticSink,
        handle: ConnectionHandle,
        timeout: Duration,
        now: Instant,
    ) -> Result<Self, SessionError>
    where
        T: ClientTransport + ?Sized,
        I: IdentityProvider + ?Sized,
        C: Codec,
    {
        let ticket = identity.issue_ticket()?;

        let message = AuthTicketMessage {
            ticket: ticket.as_bytes().to_vec(),
        };
        let encoded = MessageEnvelope::encode(codec, MessageKind::AuthTicket, &message)
            .and_then(|envelope| Ok((envelope.to_bytes(codec)?, envelope)));
        let (bytes, envelope) = match encoded {
            Ok(pair) => pair,
            Err(e) => {
                identity.revoke_ticket(ticket);
                return Err(AuthError::TicketUnavailable(format!(
                    "ticket could not be encoded: {e}"
                ))
                .into());
            }
        };

        if let Err(e) = transport.send(handle, &bytes, Channel::ReliableOrdered) {
            identity.revoke_ticket(ticket);
            return Err(ConnectionError::LinkLost(e.to_string()).into());
        }

        diagnostics.record(DiagnosticEntry {
            direction: Direction::Outbound,
            handle,
            kind: envelope.kind,
            payload: envelope.payload,
        });
        tracing::debug!(%handle, ticket = %ticket.id(), "auth ticket sent");

        Ok(Self {
            handle,
            ticket,
            timeout,
            deadline: now + timeout.min(SessionConfig::MAX_TIMEOUT),
        })
    }

    /// The link the ticket was sent on.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    /// Id of the ticket in flight.
    pub fn ticket_id(&self) -> crate::TicketId {
        self.ticket.id()
    }

    /// When the host's answer is due.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Judges the host's answer.
    ///
    /// # Errors
    /// [`AuthError::AuthRejected`] carrying the host's reason.
    pub fn resolve(&self, result: &AuthResultMessage) -> Result<(), AuthError> {
        if result.accepted {
            Ok(())
        } else {
            Err(AuthError::AuthRejected {
                reason: result.reason.clone(),
            })
        }
    }

    /// # Errors
    /// [`AuthError::AuthTimeout`] once `now` reaches the deadline.
    pub fn check_timeout(&self, now: Instant) -> Result<(), AuthError> {
        if now >= self.deadline {
            Err(AuthError::AuthTimeout(self.timeout))
        } else {
            Ok(())
        }
    }

    /// Ends the handshake, handing the ticket to the caller.
    pub fn into_ticket(self) -> AuthTicket {
        self.ticket
    }
}

#[cfg(test)]
mod tests {
    use lanyard_protocol::JsonCodec;
    use lanyard_transport::{MemoryTransport, TransportEvent};

    use super::*;
    use crate::diagnostics::MessageLog;
    use crate::LocalTicketIssuer;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn established() -> (MemoryTransport, lanyard_transport::MemoryRemote, ConnectionHandle) {
        let (mut transport, remote) = MemoryTransport::pair();
        let handle = transport.connect("host").unwrap();
        remote.establish(handle);
        assert!(matches!(
            transport.poll_event(),
            Some(TransportEvent::LinkEstablished(_))
        ));
        (transport, remote, handle)
    }

    #[test]
    fn test_begin_sends_ticket_reliably() {
        let (mut transport, remote, handle) = established();
        let mut identity = LocalTicketIssuer::new();
        let mut log = MessageLog::new(8);
        let now = Instant::now();

        let handshake = Handshake::begin(
            &mut transport, &mut identity, &JsonCodec, &mut log, handle, TIMEOUT, now,
        )
        .unwrap();

        let sent = remote.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, Channel::ReliableOrdered);

        let envelope = MessageEnvelope::from_bytes(&JsonCodec, &sent[0].data).unwrap();
        assert_eq!(envelope.kind, MessageKind::AuthTicket);
        let message: AuthTicketMessage = envelope.decode_payload(&JsonCodec).unwrap();
        assert_eq!(message.ticket.len(), LocalTicketIssuer::TICKET_LEN);

        assert_eq!(handshake.deadline(), now + TIMEOUT);
        assert_eq!(log.latest().unwrap().direction, Direction::Outbound);
        assert_eq!(identity.outstanding(), 1);
    }

    #[test]
    fn test_begin_with_unbounded_timeout_caps_deadline() {
        let (mut transport, _remote, handle) = established();
        let mut identity = LocalTicketIssuer::new();
        let now = Instant::now();

        let handshake = Handshake::begin(
            &mut transport,
            &mut identity,
            &JsonCodec,
            &mut MessageLog::new(0),
            handle,
            Duration::MAX,
            now,
        )
        .unwrap();

        assert_eq!(handshake.deadline(), now + SessionConfig::MAX_TIMEOUT);
    }

    #[test]
    fn test_begin_without_ticket_returns_ticket_unavailable() {
        let (mut transport, remote, handle) = established();
        let mut identity = LocalTicketIssuer::new();
        identity.set_unavailable("signed out");

        let result = Handshake::begin(
            &mut transport,
            &mut identity,
            &JsonCodec,
            &mut MessageLog::new(0),
            handle,
            TIMEOUT,
            Instant::now(),
        );

        assert!(matches!(
            result,
            Err(SessionError::Auth(AuthError::TicketUnavailable(_)))
        ));
        assert!(remote.sent().is_empty());
    }

    #[test]
    fn test_begin_send_failure_revokes_ticket() {
        let (mut transport, remote, handle) = established();
        let mut identity = LocalTicketIssuer::new();
        remote.lose(handle, "gone");

        let result = Handshake::begin(
            &mut transport,
            &mut identity,
            &JsonCodec,
            &mut MessageLog::new(0),
            handle,
            TIMEOUT,
            Instant::now(),
        );

        assert!(matches!(
            result,
            Err(SessionError::Connection(ConnectionError::LinkLost(_)))
        ));
        assert_eq!(identity.outstanding(), 0);
    }

    #[test]
    fn test_resolve_rejection_carries_reason() {
        let (mut transport, _remote, handle) = established();
        let mut identity = LocalTicketIssuer::new();
        let handshake = Handshake::begin(
            &mut transport,
            &mut identity,
            &JsonCodec,
            &mut MessageLog::new(0),
            handle,
            TIMEOUT,
            Instant::now(),
        )
        .unwrap();

        assert!(handshake.resolve(&AuthResultMessage::accept()).is_ok());
        let err = handshake
            .resolve(&AuthResultMessage::reject("full"))
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::AuthRejected { reason: Some(ref r) } if r == "full"
        ));
    }

    #[test]
    fn test_check_timeout_expires_at_deadline() {
        let (mut transport, _remote, handle) = established();
        let mut identity = LocalTicketIssuer::new();
        let now = Instant::now();
        let handshake = Handshake::begin(
            &mut transport,
            &mut identity,
            &JsonCodec,
            &mut MessageLog::new(0),
            handle,
            TIMEOUT,
            now,
        )
        .unwrap();

        assert!(handshake.check_timeout(now + TIMEOUT / 2).is_ok());
        assert!(matches!(
            handshake.check_timeout(now + TIMEOUT),
            Err(AuthError::AuthTimeout(t)) if t == TIMEOUT
        ));
    }
}
