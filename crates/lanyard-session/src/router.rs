//! Dispatch of received envelopes by kind.
//!
//! ```text
//!   Inbound::Envelope ──→ MessageRouter::handle_data
//!                             ├─ AuthResult  → Session (handshake)
//!                             ├─ HostExiting → Session (link lost)
//!                             ├─ PlayerData  → handle_player_data → EntitySink
//!                             └─ Custom(n)   → registered MessageHandler
//! ```
//!
//! Built-in kinds are wired to the session and can't be overridden.
//! Anything without a route is reported as [`MessageError::UnknownKind`]
//! and dropped; the session keeps running.

use std::collections::HashMap;
use std::fmt;

use lanyard_protocol::{
    AuthResultMessage, Codec, MessageEnvelope, MessageKind, PlayerData,
};
use lanyard_transport::{Channel, ClientTransport, ConnectionHandle};
use tracing::debug;

use crate::{IdentityProvider, MessageError, Session};

/// Where a [`PlayerData`] snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Produced by this process (local prediction / echo).
    Local,
    /// Received on a link.
    Peer(ConnectionHandle),
}

/// Receives player snapshots that passed routing checks.
///
/// Usually implemented by the game's entity system.
pub trait EntitySink {
    fn apply_player_data(&mut self, data: &PlayerData);
}

/// Handles one custom message kind.
///
/// Implemented for any `FnMut(ConnectionHandle, &MessageEnvelope) ->
/// Result<(), MessageError>`, so a closure is usually enough:
///
/// ```rust
/// use lanyard_protocol::{MessageEnvelope, MessageKind};
/// use lanyard_session::{MessageError, MessageRouter};
/// use lanyard_transport::ConnectionHandle;
///
/// let mut router = MessageRouter::new();
/// let chat = MessageKind::custom(0x0100).unwrap();
/// router
///     .register(
///         chat,
///         |source: ConnectionHandle, envelope: &MessageEnvelope| -> Result<(), MessageError> {
///             println!("{source}: {} bytes", envelope.payload.len());
///             Ok(())
///         },
///     )
///     .unwrap();
/// assert!(router.is_registered(chat));
/// ```
pub trait MessageHandler {
    /// # Errors
    /// Any [`MessageError`]; the envelope is then counted as dropped.
    fn handle(
        &mut self,
        source: ConnectionHandle,
        envelope: &MessageEnvelope,
    ) -> Result<(), MessageError>;
}

impl<F> MessageHandler for F
where
    F: FnMut(ConnectionHandle, &MessageEnvelope) -> Result<(), MessageError>,
{
    fn handle(
        &mut self,
        source: ConnectionHandle,
        envelope: &MessageEnvelope,
    ) -> Result<(), MessageError> {
        self(source, envelope)
    }
}

// ---------------------------------------------------------------------------
// MessageRouter
// ---------------------------------------------------------------------------

/// Routes envelopes to the session, the entity sink, or custom handlers.
#[derive(Default)]
pub struct MessageRouter {
    handlers: HashMap<MessageKind, Box<dyn MessageHandler + Send>>,
}

impl fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().map(|k| k.code()).collect();
        kinds.sort_unstable();
        f.debug_struct("MessageRouter").field("kinds", &kinds).finish()
    }
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` for `kind`, replacing any earlier one.
    ///
    /// Custom kinds, plus `AuthTicket` for a host that validates the
    /// tickets of its relay peers.
    ///
    /// # Errors
    /// [`MessageError::ReservedKind`] for `AuthResult`, `PlayerData` and
    /// `HostExiting`, which the session handles itself.
    pub fn register(
        &mut self,
        kind: MessageKind,
        handler: impl MessageHandler + Send + 'static,
    ) -> Result<(), MessageError> {
        if is_session_kind(kind) {
            return Err(MessageError::ReservedKind(kind));
        }
        if self.handlers.insert(kind, Box::new(handler)).is_some() {
            debug!(%kind, "replaced message handler");
        }
        Ok(())
    }

    /// Removes the handler for `kind`. Returns `false` if there was none.
    pub fn unregister(&mut self, kind: MessageKind) -> bool {
        self.handlers.remove(&kind).is_some()
    }

    pub fn is_registered(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Routes one envelope received from `source`.
    ///
    /// # Errors
    /// The reason the envelope was dropped. Failures that end the
    /// connection (rejected auth, host exiting) are not errors here; they
    /// surface through [`Session::take_failure`].
    pub fn handle_data<T, I, C, S>(
        &mut self,
        session: &mut Session<T, I, C>,
        sink: &mut S,
        source: ConnectionHandle,
        envelope: &MessageEnvelope,
    ) -> Result<(), MessageError>
    where
        T: ClientTransport,
        I: IdentityProvider,
        C: Codec,
        S: EntitySink + ?Sized,
    {
        let result = self.dispatch(session, sink, source, envelope);
        if let Err(error) = &result {
            debug!(%source, kind = %envelope.kind, %error, "dropping envelope");
        }
        result
    }

    fn dispatch<T, I, C, S>(
        &mut self,
        session: &mut Session<T, I, C>,
        sink: &mut S,
        source: ConnectionHandle,
        envelope: &MessageEnvelope,
    ) -> Result<(), MessageError>
    where
        T: ClientTransport,
        I: IdentityProvider,
        C: Codec,
        S: EntitySink + ?Sized,
    {
        match envelope.kind {
            MessageKind::AuthResult => {
                let result: AuthResultMessage = envelope
                    .decode_payload(session.codec())
                    .map_err(MessageError::MalformedPayload)?;
                session.on_auth_result(source, &result);
                Ok(())
            }
            MessageKind::HostExiting => {
                session.on_host_exiting(source);
                Ok(())
            }
            MessageKind::PlayerData => {
                let data: PlayerData = envelope
                    .decode_payload(session.codec())
                    .map_err(MessageError::MalformedPayload)?;
                handle_player_data(session, sink, &data, Origin::Peer(source))
            }
            // AuthTicket only has a handler when this process is a host
            // validating its own peers.
            kind @ (MessageKind::AuthTicket | MessageKind::Custom(_)) => match self
                .handlers
                .get_mut(&kind)
            {
                Some(handler) => handler.handle(source, envelope),
                None => Err(MessageError::UnknownKind(kind.code())),
            },
        }
    }
}

/// Kinds the session consumes itself.
fn is_session_kind(kind: MessageKind) -> bool {
    matches!(
        kind,
        MessageKind::AuthResult | MessageKind::PlayerData | MessageKind::HostExiting
    )
}

// ---------------------------------------------------------------------------
// Player data
// ---------------------------------------------------------------------------

/// Applies a player snapshot to the entity sink.
///
/// Local snapshots always apply. Remote ones only if `source` is the
/// authenticated host link or an admitted peer.
///
/// # Errors
/// [`MessageError::UnauthenticatedSource`] for a remote snapshot from
/// anywhere else; the sink is not touched.
pub fn handle_player_data<T, I, C, S>(
    session: &Session<T, I, C>,
    sink: &mut S,
    data: &PlayerData,
    origin: Origin,
) -> Result<(), MessageError>
where
    T: ClientTransport,
    I: IdentityProvider,
    C: Codec,
    S: EntitySink + ?Sized,
{
    if let Origin::Peer(source) = origin {
        if !session.is_authenticated_peer(source) {
            return Err(MessageError::UnauthenticatedSource(source));
        }
    }
    sink.apply_player_data(data);
    Ok(())
}

/// Sends a local player snapshot to the host on the unreliable channel,
/// then applies it locally.
///
/// The local echo happens only if the send succeeded.
///
/// # Errors
/// As [`Session::send_message`].
pub fn send_player_data<T, I, C, S>(
    session: &mut Session<T, I, C>,
    sink: &mut S,
    data: &PlayerData,
) -> Result<(), MessageError>
where
    T: ClientTransport,
    I: IdentityProvider,
    C: Codec,
    S: EntitySink + ?Sized,
{
    session.send_message(MessageKind::PlayerData, data, Channel::Unreliable)?;
    handle_player_data(session, sink, data, Origin::Local)
}
