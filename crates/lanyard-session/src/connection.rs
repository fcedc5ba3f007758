//! The client connection state machine.
//!
//! [`Session`] owns one transport, one identity provider and one codec,
//! and drives a single connection attempt at a time through
//! [`ConnectionState`]. It never blocks and never spawns: the host
//! application calls it from its frame loop, and everything time-related
//! takes an explicit `now`.
//!
//! # Per-frame use
//!
//! ```text
//!   while let Some(inbound) = session.receive_net_data(now) {
//!       route(inbound)          // MessageRouter::handle_data
//!   }
//!   session.advance_timers(now)
//!   if let Some(err) = session.take_failure() { ... }
//! ```
//!
//! # Link ownership
//!
//! The connection handle and the auth ticket live inside the state they
//! belong to (see `Link`). `Connecting` has a handle but no ticket,
//! `PendingAuthentication` has a handle and an in-flight [`Handshake`],
//! `Authenticated` has a handle and the accepted ticket. Leaving any of
//! them goes through one place that closes the handle and revokes the
//! ticket, so neither can leak.

use std::collections::HashSet;
use std::time::Instant;

use lanyard_protocol::{
    AuthResultMessage, Codec, JsonCodec, MessageEnvelope, MessageKind, ProtocolError,
};
use lanyard_transport::{Channel, ClientTransport, ConnectionHandle, TransportEvent};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::diagnostics::{DiagnosticEntry, DiagnosticSink, Direction, MessageLog};
use crate::handshake::Handshake;
use crate::{
    AuthTicket, ConnectionError, ConnectionState, IdentityProvider, MessageError,
    SessionConfig, SessionError, TicketId,
};

/// What one call to [`Session::receive_net_data`] produced.
#[derive(Debug)]
pub enum Inbound {
    /// A decoded envelope from the host or an authenticated peer, ready
    /// for routing.
    Envelope {
        source: ConnectionHandle,
        envelope: MessageEnvelope,
    },
    /// Data that failed to decode. Already logged; count it and move on.
    Dropped(MessageError),
    /// A link event the state machine consumed itself (or one for a stale
    /// handle that was ignored).
    Consumed,
}

#[derive(Debug)]
enum Link {
    Idle,
    Connecting {
        handle: ConnectionHandle,
        deadline: Instant,
    },
    PendingAuthentication {
        handle: ConnectionHandle,
        handshake: Handshake,
    },
    Authenticated {
        handle: ConnectionHandle,
        ticket: AuthTicket,
    },
}

impl Link {
    fn state(&self) -> ConnectionState {
        match self {
            Link::Idle => ConnectionState::NotConnected,
            Link::Connecting { .. } => ConnectionState::Connecting,
            Link::PendingAuthentication { .. } => ConnectionState::PendingAuthentication,
            Link::Authenticated { .. } => ConnectionState::Authenticated,
        }
    }

    fn handle(&self) -> Option<ConnectionHandle> {
        match self {
            Link::Idle => None,
            Link::Connecting { handle, .. }
            | Link::PendingAuthentication { handle, .. }
            | Link::Authenticated { handle, .. } => Some(*handle),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A client's connection to one host, plus the host-side peers it relays
/// for.
///
/// # Type parameters
///
/// - `T`: the transport (`WebSocketTransport`, `MemoryTransport`, ...)
/// - `I`: where auth tickets come from
/// - `C`: the wire codec, JSON unless stated otherwise
///
/// # Example
///
/// ```rust
/// use lanyard_session::{ConnectionState, LocalTicketIssuer, Session, SessionConfig};
/// use lanyard_transport::MemoryTransport;
/// use lanyard_protocol::JsonCodec;
///
/// let (transport, remote) = MemoryTransport::pair();
/// let mut session = Session::new(
///     transport,
///     LocalTicketIssuer::new(),
///     JsonCodec,
///     SessionConfig::default(),
/// );
///
/// let handle = session.connect("lobby-host").unwrap();
/// assert_eq!(session.state(), ConnectionState::Connecting);
///
/// remote.establish(handle);
/// while session.receive_net_data(std::time::Instant::now()).is_some() {}
/// assert_eq!(session.state(), ConnectionState::PendingAuthentication);
/// ```
pub struct Session<T, I, C = JsonCodec>
where
    T: ClientTransport,
    I: IdentityProvider,
    C: Codec,
{
    transport: T,
    identity: I,
    codec: C,
    config: SessionConfig,
    link: Link,
    peers: HashSet<ConnectionHandle>,
    diagnostics: Box<dyn DiagnosticSink + Send>,
    failure: Option<SessionError>,
}

impl<T, I, C> Session<T, I, C>
where
    T: ClientTransport,
    I: IdentityProvider,
    C: Codec,
{
    /// Creates a session in `NotConnected`.
    ///
    /// Envelopes are recorded to a [`MessageLog`] of
    /// `config.diagnostic_capacity` entries until
    /// [`set_diagnostics`](Self::set_diagnostics) installs another sink.
    pub fn new(transport: T, identity: I, codec: C, config: SessionConfig) -> Self {
        let config = config.validated();
        Self {
            diagnostics: Box::new(MessageLog::new(config.diagnostic_capacity)),
            transport,
            identity,
            codec,
            config,
            link: Link::Idle,
            peers: HashSet::new(),
            failure: None,
        }
    }

    /// Replaces the diagnostic sink.
    pub fn set_diagnostics(&mut self, sink: impl DiagnosticSink + Send + 'static) {
        self.diagnostics = Box::new(sink);
    }

    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    /// The current link's handle. `None` exactly when `NotConnected`.
    pub fn handle(&self) -> Option<ConnectionHandle> {
        self.link.handle()
    }

    /// `true` while an auth ticket is held (in flight or accepted).
    pub fn has_ticket(&self) -> bool {
        self.ticket_id().is_some()
    }

    pub fn ticket_id(&self) -> Option<TicketId> {
        match &self.link {
            Link::PendingAuthentication { handshake, .. } => {
                Some(handshake.ticket_id())
            }
            Link::Authenticated { ticket, .. } => Some(ticket.id()),
            _ => None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut I {
        &mut self.identity
    }

    /// Takes the error that ended the last attempt, if it hasn't been
    /// taken yet.
    pub fn take_failure(&mut self) -> Option<SessionError> {
        self.failure.take()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Starts connecting to `target`.
    ///
    /// Returns immediately; the link comes up (or doesn't) on a later
    /// frame. The link timeout starts now.
    ///
    /// # Errors
    /// - [`ConnectionError::AlreadyConnecting`] in `Connecting` or
    ///   `PendingAuthentication`
    /// - [`ConnectionError::AlreadyConnected`] in `Authenticated`
    /// - [`ConnectionError::ConnectFailed`] if the transport refused
    ///
    /// The session is left unchanged on error.
    pub fn connect(&mut self, target: &T::Target) -> Result<ConnectionHandle, ConnectionError> {
        self.connect_at(target, Instant::now())
    }

    /// [`connect`](Self::connect) with the link timeout measured from
    /// `now` instead of the wall clock.
    ///
    /// # Errors
    /// As [`connect`](Self::connect).
    pub fn connect_at(
        &mut self,
        target: &T::Target,
        now: Instant,
    ) -> Result<ConnectionHandle, ConnectionError> {
        match self.state() {
            ConnectionState::NotConnected => {}
            ConnectionState::Connecting | ConnectionState::PendingAuthentication => {
                return Err(ConnectionError::AlreadyConnecting);
            }
            ConnectionState::Authenticated => return Err(ConnectionError::AlreadyConnected),
        }
        if let Some(stale) = self.failure.take() {
            debug!(error = %stale, "previous attempt's failure never taken — discarding");
        }

        let handle = self
            .transport
            .connect(target)
            .map_err(ConnectionError::ConnectFailed)?;

        self.link = Link::Connecting {
            handle,
            deadline: now + self.config.link_timeout,
        };
        info!(%handle, %target, "connecting");
        Ok(handle)
    }

    /// Closes the link (flushing queued sends) and revokes the ticket.
    ///
    /// Safe to call in any state; a no-op when `NotConnected`. Not an
    /// error, so no failure is recorded.
    pub fn disconnect(&mut self) {
        let Some(handle) = self.handle() else {
            debug!("disconnect with no link — nothing to do");
            return;
        };
        let previous = self.state();
        self.release(true);
        info!(%handle, ?previous, "disconnected");
    }

    /// Polls the transport for one event.
    ///
    /// Call in a loop until it returns `None`. Link events move the state
    /// machine; data is decoded and handed back for routing. Events for
    /// handles the session no longer owns are dropped.
    pub fn receive_net_data(&mut self, now: Instant) -> Option<Inbound> {
        let event = self.transport.poll_event()?;
        let handle = event.handle();

        if !self.owns(handle) {
            debug!(%handle, "dropping event for a link this session doesn't own");
            return Some(Inbound::Consumed);
        }

        match event {
            TransportEvent::LinkEstablished(handle) => {
                self.on_link_established(handle, now);
                Some(Inbound::Consumed)
            }
            TransportEvent::LinkLost { handle, reason } => {
                if self.link.handle() == Some(handle) {
                    self.fail(ConnectionError::LinkLost(reason).into());
                } else {
                    self.peers.remove(&handle);
                    info!(%handle, %reason, "peer link lost");
                }
                Some(Inbound::Consumed)
            }
            TransportEvent::LinkError { handle, error } => {
                if self.link.handle() != Some(handle) {
                    self.peers.remove(&handle);
                    warn!(%handle, %error, "peer link failed");
                } else if self.state() == ConnectionState::Connecting {
                    self.fail(ConnectionError::ConnectFailed(error).into());
                } else {
                    self.fail(ConnectionError::LinkLost(error.to_string()).into());
                }
                Some(Inbound::Consumed)
            }
            TransportEvent::Data { handle, data } => Some(self.decode(handle, &data)),
        }
    }

    /// Expires the link or handshake deadline once `now` reaches it.
    pub fn advance_timers(&mut self, now: Instant) {
        let expired: Option<SessionError> = match &self.link {
            Link::Connecting { deadline, .. } if now >= *deadline => {
                Some(ConnectionError::LinkTimeout(self.config.link_timeout).into())
            }
            Link::PendingAuthentication { handshake, .. } => {
                handshake.check_timeout(now).err().map(SessionError::from)
            }
            _ => None,
        };
        if let Some(error) = expired {
            self.fail(error);
        }
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Sends already-encoded payload bytes to the host.
    ///
    /// # Errors
    /// - [`MessageError::NotConnected`] unless `PendingAuthentication` or
    ///   `Authenticated`
    /// - [`MessageError::SizeExceeded`] if the encoded envelope exceeds the
    ///   transport's limit
    /// - [`MessageError::SendFailed`] if the transport refused
    ///
    /// Errors never change the state. A dead link surfaces as a link event
    /// on the next frame.
    pub fn send_data(
        &mut self,
        kind: MessageKind,
        payload: &[u8],
        channel: Channel,
    ) -> Result<(), MessageError> {
        let handle = self.send_handle()?;
        self.send_envelope(handle, MessageEnvelope::new(kind, payload.to_vec()), channel)
    }

    /// Encodes `value` with the session's codec and sends it to the host.
    ///
    /// # Errors
    /// As [`send_data`](Self::send_data), plus
    /// [`MessageError::MalformedPayload`] if `value` can't be encoded.
    pub fn send_message<M: Serialize>(
        &mut self,
        kind: MessageKind,
        value: &M,
        channel: Channel,
    ) -> Result<(), MessageError> {
        let handle = self.send_handle()?;
        let envelope = MessageEnvelope::encode(&self.codec, kind, value)
            .map_err(MessageError::MalformedPayload)?;
        self.send_envelope(handle, envelope, channel)
    }

    /// Sends to one authenticated peer instead of the host.
    ///
    /// # Errors
    /// [`MessageError::NotConnected`] if `peer` isn't authenticated,
    /// otherwise as [`send_data`](Self::send_data).
    pub fn send_data_to(
        &mut self,
        peer: ConnectionHandle,
        kind: MessageKind,
        payload: &[u8],
        channel: Channel,
    ) -> Result<(), MessageError> {
        if !self.is_authenticated_peer(peer) {
            return Err(MessageError::NotConnected);
        }
        self.send_envelope(peer, MessageEnvelope::new(kind, payload.to_vec()), channel)
    }

    // -----------------------------------------------------------------------
    // Peers
    // -----------------------------------------------------------------------

    /// Marks `peer` as authenticated, for hosts relaying between players.
    ///
    /// How the peer proved its identity is up to the host application.
    /// Peers are forgotten when the session's own link is released.
    /// Returns `false` if it was already admitted, or if the session is
    /// not `Authenticated`.
    pub fn admit_peer(&mut self, peer: ConnectionHandle) -> bool {
        if self.state() != ConnectionState::Authenticated {
            debug!(%peer, state = ?self.state(), "admit_peer outside Authenticated — refusing");
            return false;
        }
        let added = self.peers.insert(peer);
        if added {
            info!(%peer, "peer admitted");
        }
        added
    }

    /// Forgets `peer`. Returns `false` if it wasn't admitted.
    pub fn release_peer(&mut self, peer: ConnectionHandle) -> bool {
        let removed = self.peers.remove(&peer);
        if removed {
            info!(%peer, "peer released");
        }
        removed
    }

    /// `true` for an admitted peer, or for the host link once
    /// `Authenticated`.
    pub fn is_authenticated_peer(&self, handle: ConnectionHandle) -> bool {
        matches!(&self.link, Link::Authenticated { handle: h, .. } if *h == handle)
            || self.peers.contains(&handle)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    // -----------------------------------------------------------------------
    // Built-in message hooks (called by the router)
    // -----------------------------------------------------------------------

    /// Applies the host's verdict on our ticket.
    ///
    /// Ignored (with a log line) unless a handshake is in flight on
    /// `source`.
    pub(crate) fn on_auth_result(&mut self, source: ConnectionHandle, result: &AuthResultMessage) {
        let (handle, handshake) = match std::mem::replace(&mut self.link, Link::Idle) {
            Link::PendingAuthentication { handle, handshake } if handle == source => {
                (handle, handshake)
            }
            other => {
                self.link = other;
                debug!(%source, state = ?self.state(), "AuthResult with no handshake in flight — ignoring");
                return;
            }
        };

        match handshake.resolve(result) {
            Ok(()) => {
                let ticket = handshake.into_ticket();
                info!(%handle, ticket = %ticket.id(), "authenticated");
                self.link = Link::Authenticated { handle, ticket };
            }
            Err(error) => {
                self.link = Link::PendingAuthentication { handle, handshake };
                self.fail(error.into());
            }
        }
    }

    /// The host announced it's going away.
    pub(crate) fn on_host_exiting(&mut self, source: ConnectionHandle) {
        if self.link.handle() == Some(source) {
            self.fail(ConnectionError::LinkLost("host exiting".into()).into());
        } else if self.peers.remove(&source) {
            info!(peer = %source, "peer exiting");
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn owns(&self, handle: ConnectionHandle) -> bool {
        self.link.handle() == Some(handle) || self.peers.contains(&handle)
    }

    fn send_handle(&self) -> Result<ConnectionHandle, MessageError> {
        match &self.link {
            Link::PendingAuthentication { handle, .. } | Link::Authenticated { handle, .. } => {
                Ok(*handle)
            }
            _ => Err(MessageError::NotConnected),
        }
    }

    fn send_envelope(
        &mut self,
        handle: ConnectionHandle,
        envelope: MessageEnvelope,
        channel: Channel,
    ) -> Result<(), MessageError> {
        let bytes = envelope
            .to_bytes(&self.codec)
            .map_err(MessageError::MalformedPayload)?;

        let max = self.transport.max_message_size();
        if bytes.len() > max {
            return Err(MessageError::SizeExceeded {
                size: bytes.len(),
                max,
            });
        }

        self.transport
            .send(handle, &bytes, channel)
            .map_err(MessageError::SendFailed)?;

        trace!(%handle, kind = %envelope.kind, ?channel, len = bytes.len(), "sent");
        self.diagnostics.record(DiagnosticEntry {
            direction: Direction::Outbound,
            handle,
            kind: envelope.kind,
            payload: envelope.payload,
        });
        Ok(())
    }

    fn decode(&mut self, handle: ConnectionHandle, data: &[u8]) -> Inbound {
        match MessageEnvelope::from_bytes(&self.codec, data) {
            Ok(envelope) => {
                self.diagnostics.record(DiagnosticEntry {
                    direction: Direction::Inbound,
                    handle,
                    kind: envelope.kind,
                    payload: envelope.payload.clone(),
                });
                Inbound::Envelope {
                    source: handle,
                    envelope,
                }
            }
            Err(ProtocolError::UnknownKind(code)) => {
                debug!(%handle, code, "dropping envelope of unknown kind");
                Inbound::Dropped(MessageError::UnknownKind(code))
            }
            Err(e) => {
                warn!(%handle, error = %e, len = data.len(), "dropping undecodable data");
                Inbound::Dropped(MessageError::MalformedPayload(e))
            }
        }
    }

    fn on_link_established(&mut self, established: ConnectionHandle, now: Instant) {
        match &self.link {
            Link::Connecting { handle, .. } if *handle == established => {}
            _ => {
                debug!(handle = %established, state = ?self.state(), "unexpected LinkEstablished — ignoring");
                return;
            }
        }

        match Handshake::begin(
            &mut self.transport,
            &mut self.identity,
            &self.codec,
            self.diagnostics.as_mut(),
            established,
            self.config.handshake_timeout,
            now,
        ) {
            Ok(handshake) => {
                info!(handle = %established, "link established — authenticating");
                self.link = Link::PendingAuthentication {
                    handle: established,
                    handshake,
                };
            }
            Err(error) => self.fail(error),
        }
    }

    /// Ends the current attempt: close without flushing, revoke the
    /// ticket, record why.
    fn fail(&mut self, error: SessionError) {
        let previous = self.state();
        let handle = self.handle();
        self.release(false);
        warn!(?handle, ?previous, %error, "connection failed");

        if self.failure.is_none() {
            self.failure = Some(error);
        } else {
            debug!(%error, "earlier failure not yet taken — keeping it");
        }
    }

    fn release(&mut self, flush: bool) {
        match std::mem::replace(&mut self.link, Link::Idle) {
            Link::Idle => {}
            Link::Connecting { handle, .. } => self.transport.close(handle, flush),
            Link::PendingAuthentication { handle, handshake } => {
                self.transport.close(handle, flush);
                self.identity.revoke_ticket(handshake.into_ticket());
            }
            Link::Authenticated { handle, ticket } => {
                self.transport.close(handle, flush);
                self.identity.revoke_ticket(ticket);
            }
        }
        for peer in self.peers.drain() {
            self.transport.close(peer, flush);
        }
    }
}

impl<T, I, C> Drop for Session<T, I, C>
where
    T: ClientTransport,
    I: IdentityProvider,
    C: Codec,
{
    fn drop(&mut self) {
        self.release(true);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lanyard_protocol::{AuthTicketMessage, JsonCodec};
    use lanyard_transport::{MemoryRemote, MemoryTransport, TransportError};

    use super::*;
    use crate::{AuthError, LocalTicketIssuer};

    type TestSession = Session<MemoryTransport, LocalTicketIssuer>;

    fn session() -> (TestSession, MemoryRemote) {
        let (transport, remote) = MemoryTransport::pair();
        let session = Session::new(
            transport,
            LocalTicketIssuer::new(),
            JsonCodec,
            SessionConfig::default(),
        );
        (session, remote)
    }

    fn drain(session: &mut TestSession, now: Instant) -> Vec<Inbound> {
        std::iter::from_fn(|| session.receive_net_data(now)).collect()
    }

    fn pending(session: &mut TestSession, remote: &MemoryRemote) -> ConnectionHandle {
        let handle = session.connect("host").unwrap();
        remote.establish(handle);
        drain(session, Instant::now());
        assert_eq!(session.state(), ConnectionState::PendingAuthentication);
        handle
    }

    fn authenticated(session: &mut TestSession, remote: &MemoryRemote) -> ConnectionHandle {
        let handle = pending(session, remote);
        session.on_auth_result(handle, &AuthResultMessage::accept());
        assert_eq!(session.state(), ConnectionState::Authenticated);
        handle
    }

    fn envelope_bytes(kind: MessageKind, payload: &impl Serialize) -> Vec<u8> {
        MessageEnvelope::encode(&JsonCodec, kind, payload)
            .unwrap()
            .to_bytes(&JsonCodec)
            .unwrap()
    }

    // =======================================================================
    // connect
    // =======================================================================

    #[test]
    fn test_connect_from_not_connected_enters_connecting() {
        let (mut session, remote) = session();
        let handle = session.connect("host").unwrap();

        assert_eq!(session.state(), ConnectionState::Connecting);
        assert_eq!(session.handle(), Some(handle));
        assert!(!session.has_ticket());
        assert_eq!(remote.connects(), vec![(handle, "host".to_string())]);
    }

    #[test]
    fn test_connect_twice_returns_already_connecting() {
        let (mut session, _remote) = session();
        let handle = session.connect("host").unwrap();

        let err = session.connect("other").unwrap_err();
        assert!(matches!(err, ConnectionError::AlreadyConnecting));
        assert_eq!(session.handle(), Some(handle));
    }

    #[test]
    fn test_connect_refused_stays_not_connected() {
        let (mut session, remote) = session();
        remote.refuse_next_connect("no route");

        let err = session.connect("host").unwrap_err();
        assert!(matches!(err, ConnectionError::ConnectFailed(_)));
        assert_eq!(session.state(), ConnectionState::NotConnected);
        assert!(session.handle().is_none());
    }

    #[test]
    fn test_connect_while_authenticated_returns_already_connected() {
        let (mut session, remote) = session();
        let handle = pending(&mut session, &remote);
        session.on_auth_result(handle, &AuthResultMessage::accept());

        assert!(matches!(
            session.connect("host"),
            Err(ConnectionError::AlreadyConnected)
        ));
    }

    // =======================================================================
    // link establishment & handshake
    // =======================================================================

    #[test]
    fn test_link_established_sends_ticket_and_awaits_auth() {
        let (mut session, remote) = session();
        let handle = pending(&mut session, &remote);

        assert!(session.has_ticket());
        assert_eq!(session.identity().outstanding(), 1);

        let sent = remote.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].handle, handle);
        let envelope = MessageEnvelope::from_bytes(&JsonCodec, &sent[0].data).unwrap();
        assert_eq!(envelope.kind, MessageKind::AuthTicket);
        let message: AuthTicketMessage = envelope.decode_payload(&JsonCodec).unwrap();
        assert_eq!(message.ticket.len(), LocalTicketIssuer::TICKET_LEN);
    }

    #[test]
    fn test_ticket_unavailable_fails_attempt_and_closes_link() {
        let (mut session, remote) = session();
        session.identity_mut().set_unavailable("signed out");
        let handle = session.connect("host").unwrap();
        remote.establish(handle);
        drain(&mut session, Instant::now());

        assert_eq!(session.state(), ConnectionState::NotConnected);
        assert!(matches!(
            session.take_failure(),
            Some(SessionError::Auth(AuthError::TicketUnavailable(_)))
        ));
        assert_eq!(remote.closed(), vec![(handle, false)]);
    }

    #[test]
    fn test_auth_accepted_keeps_ticket() {
        let (mut session, remote) = session();
        let handle = pending(&mut session, &remote);
        let ticket = session.ticket_id();

        remote.deliver(
            handle,
            envelope_bytes(MessageKind::AuthResult, &AuthResultMessage::accept()),
        );
        let inbound = drain(&mut session, Instant::now());
        let Some(Inbound::Envelope { envelope, .. }) = inbound.into_iter().next() else {
            panic!("expected an envelope");
        };
        let result: AuthResultMessage = envelope.decode_payload(&JsonCodec).unwrap();
        session.on_auth_result(handle, &result);

        assert_eq!(session.state(), ConnectionState::Authenticated);
        assert_eq!(session.ticket_id(), ticket);
        assert!(session.is_authenticated_peer(handle));
    }

    #[test]
    fn test_auth_rejected_returns_to_not_connected_and_revokes() {
        let (mut session, remote) = session();
        let handle = pending(&mut session, &remote);

        session.on_auth_result(handle, &AuthResultMessage::reject("banned"));

        assert_eq!(session.state(), ConnectionState::NotConnected);
        assert!(session.handle().is_none());
        assert!(!session.has_ticket());
        assert_eq!(session.identity().outstanding(), 0);
        assert!(matches!(
            session.take_failure(),
            Some(SessionError::Auth(AuthError::AuthRejected { reason: Some(_) }))
        ));
        assert!(session.take_failure().is_none());
    }

    #[test]
    fn test_auth_result_from_other_handle_is_ignored() {
        let (mut session, remote) = session();
        pending(&mut session, &remote);

        session.on_auth_result(ConnectionHandle::new(99), &AuthResultMessage::accept());
        assert_eq!(session.state(), ConnectionState::PendingAuthentication);
    }

    // =======================================================================
    // timers
    // =======================================================================

    #[test]
    fn test_link_timeout_fails_connecting() {
        let (mut session, remote) = session();
        let handle = session.connect("host").unwrap();

        session.advance_timers(Instant::now() + Duration::from_secs(1));
        assert_eq!(session.state(), ConnectionState::Connecting);

        session.advance_timers(Instant::now() + Duration::from_secs(16));
        assert_eq!(session.state(), ConnectionState::NotConnected);
        assert!(matches!(
            session.take_failure(),
            Some(SessionError::Connection(ConnectionError::LinkTimeout(_)))
        ));
        assert_eq!(remote.closed(), vec![(handle, false)]);
    }

    #[test]
    fn test_connect_with_unbounded_link_timeout_does_not_panic() {
        let (transport, _remote) = MemoryTransport::pair();
        let mut session: TestSession = Session::new(
            transport,
            LocalTicketIssuer::new(),
            JsonCodec,
            SessionConfig {
                link_timeout: Duration::MAX,
                ..SessionConfig::default()
            },
        );
        let start = Instant::now();

        session.connect_at("host", start).unwrap();
        session.advance_timers(start + Duration::from_secs(3600));

        assert_eq!(session.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_second_attempt_reports_its_own_failure() {
        let (mut session, remote) = session();
        let start = Instant::now();

        // First attempt times out and nobody takes the failure.
        session.connect_at("host", start).unwrap();
        session.advance_timers(start + Duration::from_secs(15));
        assert_eq!(session.state(), ConnectionState::NotConnected);

        let second = session.connect_at("host", start + Duration::from_secs(16)).unwrap();
        assert!(session.take_failure().is_none());
        remote.fail(second, TransportError::ConnectFailed("refused".into()));
        drain(&mut session, start + Duration::from_secs(16));

        assert!(matches!(
            session.take_failure(),
            Some(SessionError::Connection(ConnectionError::ConnectFailed(_)))
        ));
        assert!(session.take_failure().is_none());
    }

    #[test]
    fn test_connect_at_measures_link_timeout_from_given_instant() {
        let (mut session, _remote) = session();
        let start = Instant::now() + Duration::from_secs(100);
        session.connect_at("host", start).unwrap();

        session.advance_timers(start + Duration::from_secs(14));
        assert_eq!(session.state(), ConnectionState::Connecting);

        session.advance_timers(start + Duration::from_secs(15));
        assert_eq!(session.state(), ConnectionState::NotConnected);
    }

    #[test]
    fn test_handshake_timeout_fails_pending_auth() {
        let (mut session, remote) = session();
        let handle = session.connect("host").unwrap();
        remote.establish(handle);
        let established_at = Instant::now();
        drain(&mut session, established_at);

        session.advance_timers(established_at + Duration::from_secs(9));
        assert_eq!(session.state(), ConnectionState::PendingAuthentication);

        session.advance_timers(established_at + Duration::from_secs(10));
        assert_eq!(session.state(), ConnectionState::NotConnected);
        assert!(matches!(
            session.take_failure(),
            Some(SessionError::Auth(AuthError::AuthTimeout(_)))
        ));
        assert_eq!(session.identity().outstanding(), 0);
    }

    // =======================================================================
    // link loss
    // =======================================================================

    #[test]
    fn test_link_lost_while_authenticated_reports_reason() {
        let (mut session, remote) = session();
        let handle = pending(&mut session, &remote);
        session.on_auth_result(handle, &AuthResultMessage::accept());

        remote.lose(handle, "remote closed");
        drain(&mut session, Instant::now());

        assert_eq!(session.state(), ConnectionState::NotConnected);
        assert_eq!(session.identity().outstanding(), 0);
        assert!(matches!(
            session.take_failure(),
            Some(SessionError::Connection(ConnectionError::LinkLost(ref r))) if r == "remote closed"
        ));
    }

    #[test]
    fn test_link_error_while_connecting_reports_connect_failed() {
        let (mut session, remote) = session();
        let handle = session.connect("host").unwrap();
        remote.fail(handle, TransportError::ConnectFailed("refused".into()));
        drain(&mut session, Instant::now());

        assert!(matches!(
            session.take_failure(),
            Some(SessionError::Connection(ConnectionError::ConnectFailed(_)))
        ));
    }

    #[test]
    fn test_host_exiting_ends_attempt() {
        let (mut session, remote) = session();
        let handle = pending(&mut session, &remote);
        session.on_auth_result(handle, &AuthResultMessage::accept());

        session.on_host_exiting(handle);

        assert_eq!(session.state(), ConnectionState::NotConnected);
        assert!(matches!(
            session.take_failure(),
            Some(SessionError::Connection(ConnectionError::LinkLost(_)))
        ));
    }

    #[test]
    fn test_stale_handle_events_are_dropped() {
        let (mut session, remote) = session();
        let handle = pending(&mut session, &remote);
        session.disconnect();

        remote.deliver(handle, b"late".to_vec());
        let inbound = drain(&mut session, Instant::now());

        assert!(matches!(inbound.as_slice(), [Inbound::Consumed]));
        assert_eq!(session.state(), ConnectionState::NotConnected);
    }

    // =======================================================================
    // disconnect
    // =======================================================================

    #[test]
    fn test_disconnect_flushes_and_revokes_without_failure() {
        let (mut session, remote) = session();
        let handle = pending(&mut session, &remote);

        session.disconnect();
        session.disconnect();

        assert_eq!(session.state(), ConnectionState::NotConnected);
        assert_eq!(remote.closed(), vec![(handle, true)]);
        assert_eq!(session.identity().outstanding(), 0);
        assert!(session.take_failure().is_none());
    }

    // =======================================================================
    // send_data
    // =======================================================================

    #[test]
    fn test_send_data_not_connected_returns_error() {
        let (mut session, remote) = session();
        let err = session
            .send_data(MessageKind::PlayerData, b"{}", Channel::Unreliable)
            .unwrap_err();

        assert!(matches!(err, MessageError::NotConnected));
        assert!(remote.sent().is_empty());
    }

    #[test]
    fn test_send_data_connecting_returns_not_connected() {
        let (mut session, _remote) = session();
        session.connect("host").unwrap();

        assert!(matches!(
            session.send_data(MessageKind::PlayerData, b"{}", Channel::Unreliable),
            Err(MessageError::NotConnected)
        ));
    }

    #[test]
    fn test_send_data_oversized_returns_size_exceeded() {
        let (mut session, remote) = session();
        pending(&mut session, &remote);
        remote.take_sent();
        remote.set_max_message_size(64);

        let err = session
            .send_data(MessageKind::PlayerData, &[0u8; 65], Channel::Unreliable)
            .unwrap_err();

        assert!(matches!(err, MessageError::SizeExceeded { max: 64, .. }));
        assert!(remote.sent().is_empty());
        assert_eq!(session.state(), ConnectionState::PendingAuthentication);
    }

    #[test]
    fn test_send_data_uses_requested_channel() {
        let (mut session, remote) = session();
        let handle = pending(&mut session, &remote);
        remote.take_sent();

        session
            .send_data(MessageKind::PlayerData, b"{}", Channel::Unreliable)
            .unwrap();

        let sent = remote.take_sent();
        assert_eq!(sent[0].handle, handle);
        assert_eq!(sent[0].channel, Channel::Unreliable);
    }

    #[test]
    fn test_send_data_to_unknown_peer_returns_not_connected() {
        let (mut session, _remote) = session();
        assert!(matches!(
            session.send_data_to(
                ConnectionHandle::new(7),
                MessageKind::PlayerData,
                b"{}",
                Channel::Unreliable
            ),
            Err(MessageError::NotConnected)
        ));
    }

    // =======================================================================
    // decoding & diagnostics
    // =======================================================================

    #[test]
    fn test_garbage_data_is_dropped_as_malformed() {
        let (mut session, remote) = session();
        let handle = pending(&mut session, &remote);

        remote.deliver(handle, b"\xff\x00 not an envelope".to_vec());
        let inbound = drain(&mut session, Instant::now());

        assert!(matches!(
            inbound.as_slice(),
            [Inbound::Dropped(MessageError::MalformedPayload(_))]
        ));
        assert_eq!(session.state(), ConnectionState::PendingAuthentication);
    }

    #[test]
    fn test_unassigned_kind_is_dropped_as_unknown() {
        let (mut session, remote) = session();
        let handle = pending(&mut session, &remote);

        remote.deliver(handle, br#"{"kind":9,"payload":[]}"#.to_vec());
        let inbound = drain(&mut session, Instant::now());

        assert!(matches!(
            inbound.as_slice(),
            [Inbound::Dropped(MessageError::UnknownKind(9))]
        ));
    }

    #[test]
    fn test_diagnostics_record_both_directions() {
        let (mut session, remote) = session();
        let log = MessageLog::new(8);
        session.set_diagnostics(log.clone());

        let handle = pending(&mut session, &remote);
        remote.deliver(
            handle,
            envelope_bytes(MessageKind::AuthResult, &AuthResultMessage::accept()),
        );
        drain(&mut session, Instant::now());

        let directions: Vec<Direction> = log.entries().iter().map(|e| e.direction).collect();
        assert_eq!(directions, vec![Direction::Outbound, Direction::Inbound]);
    }

    // =======================================================================
    // peers
    // =======================================================================

    #[test]
    fn test_admitted_peer_lost_is_released() {
        let (mut session, remote) = session();
        authenticated(&mut session, &remote);
        let peer = ConnectionHandle::new(42);
        assert!(session.admit_peer(peer));
        assert!(!session.admit_peer(peer));
        assert!(session.is_authenticated_peer(peer));

        remote.lose(peer, "left");
        drain(&mut session, Instant::now());

        assert!(!session.is_authenticated_peer(peer));
        assert!(session.take_failure().is_none());
    }

    #[test]
    fn test_disconnect_releases_admitted_peers() {
        let (mut session, remote) = session();
        authenticated(&mut session, &remote);
        let peer = ConnectionHandle::new(42);
        assert!(session.admit_peer(peer));

        session.disconnect();

        assert_eq!(session.peer_count(), 0);
        assert!(!session.is_authenticated_peer(peer));
    }

    #[test]
    fn test_admit_peer_outside_authenticated_is_refused() {
        let (mut session, remote) = session();
        let peer = ConnectionHandle::new(42);
        assert!(!session.admit_peer(peer));

        pending(&mut session, &remote);
        assert!(!session.admit_peer(peer));

        session.disconnect();
        assert_eq!(session.peer_count(), 0);
        assert!(!session.is_authenticated_peer(peer));
    }

    #[test]
    fn test_drop_closes_link_with_flush() {
        let (mut session, remote) = session();
        let handle = pending(&mut session, &remote);
        drop(session);

        assert_eq!(remote.closed(), vec![(handle, true)]);
    }
}
