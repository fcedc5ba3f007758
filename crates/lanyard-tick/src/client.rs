//! The per-frame driver tying session, router, lobby and hooks together.

use std::time::Instant;

use lanyard_lobby::{LobbyController, LobbyError, LobbyParams, Matchmaker};
use lanyard_protocol::{Codec, JsonCodec, MessageKind};
use lanyard_session::{
    ConnectionError, ConnectionState, IdentityProvider, Inbound, MessageError, MessageRouter,
    Session, send_player_data,
};
use lanyard_transport::{Channel, ClientTransport, ConnectionHandle};
use tracing::{debug, trace};

use crate::hooks::{HookContext, Outbox, Outgoing};
use crate::{ScriptHost, TickReport};

/// A game client: one [`Session`], its [`MessageRouter`] and a
/// [`LobbyController`], advanced once per frame by [`tick`](Self::tick).
pub struct Client<T, I, C = JsonCodec>
where
    T: ClientTransport,
    I: IdentityProvider,
    C: Codec,
{
    session: Session<T, I, C>,
    router: MessageRouter,
    lobby: LobbyController,
    outbox: Outbox,
    frame: u64,
}

impl<T, I, C> Client<T, I, C>
where
    T: ClientTransport,
    I: IdentityProvider,
    C: Codec,
{
    pub fn new(session: Session<T, I, C>) -> Self {
        Self::with_router(session, MessageRouter::new())
    }

    /// A client with custom handlers already registered.
    pub fn with_router(session: Session<T, I, C>, router: MessageRouter) -> Self {
        Self {
            session,
            router,
            lobby: LobbyController::new(),
            outbox: Outbox::default(),
            frame: 0,
        }
    }

    pub fn session(&self) -> &Session<T, I, C> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T, I, C> {
        &mut self.session
    }

    pub fn router_mut(&mut self) -> &mut MessageRouter {
        &mut self.router
    }

    pub fn lobby(&self) -> &LobbyController {
        &self.lobby
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Frames ticked so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// See [`Session::connect`].
    ///
    /// # Errors
    /// As [`Session::connect`].
    pub fn connect(&mut self, target: &T::Target) -> Result<ConnectionHandle, ConnectionError> {
        self.session.connect(target)
    }

    /// See [`Session::disconnect`]. Anything still in the outbox is
    /// discarded.
    pub fn disconnect(&mut self) {
        let discarded = self.outbox.drain().count();
        if discarded > 0 {
            debug!(discarded, "discarding queued sends on disconnect");
        }
        self.session.disconnect();
    }

    /// See [`Session::send_data`].
    ///
    /// # Errors
    /// As [`Session::send_data`].
    pub fn send_data(
        &mut self,
        kind: MessageKind,
        payload: &[u8],
        channel: Channel,
    ) -> Result<(), MessageError> {
        self.session.send_data(kind, payload, channel)
    }

    /// See [`LobbyController::create_lobby`]. The result arrives in a
    /// later frame's [`TickReport::lobby`].
    ///
    /// # Errors
    /// [`LobbyError::CreationInProgress`] if a request is outstanding.
    pub fn create_lobby<M>(&mut self, matchmaker: &mut M, params: &LobbyParams) -> Result<(), LobbyError>
    where
        M: Matchmaker + ?Sized,
    {
        self.lobby.create_lobby(matchmaker, params)
    }

    /// Runs one frame.
    ///
    /// 1. Drain every transport event and route each envelope.
    /// 2. Advance the link/handshake timers and poll the lobby request.
    /// 3. Unless `NotConnected`, run `on_network_tick` then
    ///    `on_presentation_update`.
    /// 4. Flush what the hooks queued.
    ///
    /// Never blocks. Nothing here is fatal: failures are in the report.
    pub fn tick<S>(&mut self, script: &mut S, now: Instant) -> TickReport
    where
        S: ScriptHost + ?Sized,
    {
        self.frame += 1;
        let mut report = TickReport::new(self.frame);

        while let Some(inbound) = self.session.receive_net_data(now) {
            match inbound {
                Inbound::Envelope { source, envelope } => {
                    match self
                        .router
                        .handle_data(&mut self.session, script, source, &envelope)
                    {
                        Ok(()) => report.routed += 1,
                        Err(_) => report.dropped += 1,
                    }
                }
                Inbound::Dropped(_) => report.dropped += 1,
                Inbound::Consumed => {}
            }
        }

        self.session.advance_timers(now);
        if let Some(result) = self.lobby.poll() {
            report.lobby = Some(result.into_outcome());
        }
        report.failure = self.session.take_failure();

        let state = self.session.state();
        if state != ConnectionState::NotConnected {
            let mut ctx = HookContext::new(self.frame, now, state, &mut self.outbox);
            script.on_network_tick(&mut ctx);
            script.on_presentation_update(&mut ctx);
            report.hooks_ran = true;
        }

        for outgoing in self.outbox.drain() {
            let sent = match outgoing {
                Outgoing::Data {
                    kind,
                    payload,
                    channel,
                } => self.session.send_data(kind, &payload, channel),
                Outgoing::PlayerData(data) => send_player_data(&mut self.session, script, &data),
            };
            if let Err(error) = sent {
                debug!(frame = self.frame, %error, "queued send failed");
                report.send_errors.push(error);
            }
        }

        trace!(
            frame = self.frame,
            ?state,
            routed = report.routed,
            dropped = report.dropped,
            "frame done"
        );
        report
    }
}
