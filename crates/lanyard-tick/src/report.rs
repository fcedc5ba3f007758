//! What happened during one frame.

use lanyard_lobby::{LobbyError, LobbyId};
use lanyard_session::{MessageError, SessionError};

/// Returned by [`Client::tick`](crate::Client::tick).
#[derive(Debug, Default)]
pub struct TickReport {
    /// Frame number, starting at 1.
    pub frame: u64,
    /// Envelopes delivered to the session, the entity sink or a handler.
    pub routed: usize,
    /// Envelopes dropped (undecodable, unknown kind, unauthenticated
    /// source, handler error).
    pub dropped: usize,
    /// Whether `on_network_tick` / `on_presentation_update` ran.
    pub hooks_ran: bool,
    /// The error that ended the connection attempt during this frame.
    pub failure: Option<SessionError>,
    /// The lobby request that resolved during this frame.
    pub lobby: Option<Result<LobbyId, LobbyError>>,
    /// Outbox entries that failed to send.
    pub send_errors: Vec<MessageError>,
}

impl TickReport {
    pub(crate) fn new(frame: u64) -> Self {
        Self {
            frame,
            ..Self::default()
        }
    }

    /// `true` if nothing arrived, failed or resolved.
    pub fn is_quiet(&self) -> bool {
        self.routed == 0
            && self.dropped == 0
            && self.failure.is_none()
            && self.lobby.is_none()
            && self.send_errors.is_empty()
    }
}
