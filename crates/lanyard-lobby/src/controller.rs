//! The lobby creation controller.
//!
//! Creating a lobby is a round-trip to a matchmaking service that may
//! take seconds. The controller never waits for it: it holds the
//! `oneshot::Receiver` the [`Matchmaker`] handed back and checks it once
//! per frame with `try_recv`.
//!
//! ```text
//!   create_lobby() ──→ Matchmaker ──→ oneshot::Receiver (pending)
//!                                            │
//!   poll() each frame ── Empty ──→ None      │
//!                     ── value ──→ Some(result), pending cleared
//!                     ── Closed ─→ Some(transport failure), pending cleared
//! ```

use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::{LobbyCreationResult, LobbyError, LobbyId, LobbyParams};

/// A matchmaking service that can create lobbies.
///
/// Must return right away. The answer is delivered later through the
/// returned receiver. Dropping the sender without answering is reported
/// as a transport failure.
pub trait Matchmaker {
    fn create_lobby(&mut self, params: &LobbyParams) -> oneshot::Receiver<LobbyCreationResult>;
}

// ---------------------------------------------------------------------------
// LobbyController
// ---------------------------------------------------------------------------

/// Tracks at most one outstanding lobby creation request.
#[derive(Debug, Default)]
pub struct LobbyController {
    pending: Option<oneshot::Receiver<LobbyCreationResult>>,
    current: Option<LobbyId>,
}

impl LobbyController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks `matchmaker` for a new lobby.
    ///
    /// # Errors
    /// [`LobbyError::CreationInProgress`] if a request is already
    /// outstanding. The outstanding request is left alone and the
    /// matchmaker isn't called.
    pub fn create_lobby<M>(&mut self, matchmaker: &mut M, params: &LobbyParams) -> Result<(), LobbyError>
    where
        M: Matchmaker + ?Sized,
    {
        if self.pending.is_some() {
            return Err(LobbyError::CreationInProgress);
        }
        let params = params.clone().validated();
        self.pending = Some(matchmaker.create_lobby(&params));
        info!(visibility = ?params.visibility, max_members = params.max_members, "lobby creation requested");
        Ok(())
    }

    /// Checks the outstanding request without waiting.
    ///
    /// Returns the result exactly once, on the frame it becomes
    /// available. `None` while nothing is pending or the answer hasn't
    /// arrived.
    pub fn poll(&mut self) -> Option<LobbyCreationResult> {
        let receiver = self.pending.as_mut()?;
        let result = match receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => {
                warn!("matchmaker dropped the request without answering");
                LobbyCreationResult::transport_failed()
            }
        };
        self.pending = None;

        match result.lobby_id {
            Some(id) if result.success && !result.transport_failure => {
                info!(lobby = %id, "lobby created");
                self.current = Some(id);
            }
            _ => debug!(?result, "lobby creation did not succeed"),
        }
        Some(result)
    }

    /// `true` while a request is outstanding.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The most recently created lobby.
    pub fn current_lobby(&self) -> Option<LobbyId> {
        self.current
    }

    /// Forgets the current lobby (after leaving it).
    pub fn clear_lobby(&mut self) -> Option<LobbyId> {
        self.current.take()
    }
}

// ---------------------------------------------------------------------------
// LocalMatchmaker
// ---------------------------------------------------------------------------

/// Creates lobbies on the spot with sequential ids. No service behind it.
///
/// For LAN play, demos and tests.
#[derive(Debug, Default)]
pub struct LocalMatchmaker {
    next_id: u64,
    refuse: bool,
}

impl LocalMatchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every following request with a refusal.
    pub fn refuse_all(&mut self, refuse: bool) {
        self.refuse = refuse;
    }
}

impl Matchmaker for LocalMatchmaker {
    fn create_lobby(&mut self, params: &LobbyParams) -> oneshot::Receiver<LobbyCreationResult> {
        let (tx, rx) = oneshot::channel();
        let result = if self.refuse {
            LobbyCreationResult::failed()
        } else {
            self.next_id += 1;
            LobbyCreationResult::created(LobbyId(self.next_id))
        };
        debug!(?params, ?result, "local lobby request answered");
        // The receiver is alive in `rx`, so this can't fail.
        let _ = tx.send(result);
        rx
    }
}
