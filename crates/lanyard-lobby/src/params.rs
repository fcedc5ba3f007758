//! Lobby identifiers, request parameters and results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::LobbyError;

/// Identifies a lobby on the matchmaking service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LobbyId(pub u64);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lobby-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// LobbyParams
// ---------------------------------------------------------------------------

/// Who can find and join a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyVisibility {
    /// Listed and joinable by anyone.
    #[default]
    Public,
    /// Joinable by friends of members only.
    FriendsOnly,
    /// Joinable by invitation only.
    Private,
}

/// What kind of lobby to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyParams {
    pub visibility: LobbyVisibility,

    /// Member cap, including the creator.
    ///
    /// Default: 8. Clamped to `1..=MAX_MEMBERS` by [`validated`](Self::validated).
    pub max_members: u32,
}

impl Default for LobbyParams {
    fn default() -> Self {
        Self {
            visibility: LobbyVisibility::Public,
            max_members: 8,
        }
    }
}

impl LobbyParams {
    /// Largest member cap a request may ask for.
    pub const MAX_MEMBERS: u32 = 250;

    /// Clamp `max_members` into range.
    pub fn validated(mut self) -> Self {
        if self.max_members == 0 {
            tracing::warn!("max_members is 0 — raising to 1");
            self.max_members = 1;
        }
        if self.max_members > Self::MAX_MEMBERS {
            tracing::warn!(
                requested = self.max_members,
                max = Self::MAX_MEMBERS,
                "max_members exceeds maximum — clamping"
            );
            self.max_members = Self::MAX_MEMBERS;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// LobbyCreationResult
// ---------------------------------------------------------------------------

/// The matchmaker's answer to one creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyCreationResult {
    /// The lobby was created.
    pub success: bool,
    /// The request failed below the matchmaking service (I/O, timeout).
    pub transport_failure: bool,
    /// Set when `success` is.
    pub lobby_id: Option<LobbyId>,
}

impl LobbyCreationResult {
    pub fn created(lobby_id: LobbyId) -> Self {
        Self {
            success: true,
            transport_failure: false,
            lobby_id: Some(lobby_id),
        }
    }

    /// The service refused.
    pub fn failed() -> Self {
        Self {
            success: false,
            transport_failure: false,
            lobby_id: None,
        }
    }

    /// The request never reached (or never came back from) the service.
    pub fn transport_failed() -> Self {
        Self {
            success: false,
            transport_failure: true,
            lobby_id: None,
        }
    }

    /// Collapses the flags into a `Result`.
    ///
    /// A transport failure wins over everything else. A success without
    /// an id is treated as a failed creation.
    ///
    /// # Errors
    /// [`LobbyError::TransportFailure`] or [`LobbyError::CreationFailed`].
    pub fn into_outcome(self) -> Result<LobbyId, LobbyError> {
        if self.transport_failure {
            return Err(LobbyError::TransportFailure);
        }
        match (self.success, self.lobby_id) {
            (true, Some(id)) => Ok(id),
            _ => Err(LobbyError::CreationFailed),
        }
    }
}
