//! Error types for the lobby layer.

/// Errors from creating a lobby.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// A request is already outstanding; the new one was not issued.
    #[error("a lobby creation request is already in progress")]
    CreationInProgress,

    /// The matchmaking service answered but refused to create the lobby.
    #[error("lobby creation failed")]
    CreationFailed,

    /// The request never got a proper answer (network failure, or the
    /// matchmaker went away without replying).
    #[error("lobby creation failed: transport failure")]
    TransportFailure,
}
