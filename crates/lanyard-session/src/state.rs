//! Session state and configuration types.

use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
///
/// Sensible defaults are provided; override only the fields you care
/// about with struct-update syntax:
///
/// ```rust
/// use std::time::Duration;
/// use lanyard_session::SessionConfig;
///
/// let config = SessionConfig {
///     handshake_timeout: Duration::from_secs(5),
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.link_timeout, Duration::from_secs(15));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long the transport gets to establish a link after `connect`.
    ///
    /// Default: 15 seconds.
    pub link_timeout: Duration,

    /// How long the host gets to answer the auth ticket.
    ///
    /// Default: 10 seconds.
    pub handshake_timeout: Duration,

    /// How many recent envelopes the default diagnostic log keeps.
    /// 0 disables it.
    ///
    /// Default: 64.
    pub diagnostic_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            link_timeout: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(10),
            diagnostic_capacity: 64,
        }
    }
}

impl SessionConfig {
    /// Shortest timeout accepted. Anything lower would expire before the
    /// first frame could observe a reply.
    pub const MIN_TIMEOUT: Duration = Duration::from_millis(10);

    /// Longest timeout accepted. `Instant + Duration` panics on overflow,
    /// so "never" is spelled as one day.
    pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by `Session::new`.
    pub fn validated(mut self) -> Self {
        if self.link_timeout < Self::MIN_TIMEOUT {
            tracing::warn!(
                link_timeout = ?self.link_timeout,
                "link_timeout below minimum — raising"
            );
            self.link_timeout = Self::MIN_TIMEOUT;
        }
        if self.handshake_timeout < Self::MIN_TIMEOUT {
            tracing::warn!(
                handshake_timeout = ?self.handshake_timeout,
                "handshake_timeout below minimum — raising"
            );
            self.handshake_timeout = Self::MIN_TIMEOUT;
        }
        if self.link_timeout > Self::MAX_TIMEOUT {
            tracing::warn!(
                link_timeout = ?self.link_timeout,
                "link_timeout above maximum — clamping"
            );
            self.link_timeout = Self::MAX_TIMEOUT;
        }
        if self.handshake_timeout > Self::MAX_TIMEOUT {
            tracing::warn!(
                handshake_timeout = ?self.handshake_timeout,
                "handshake_timeout above maximum — clamping"
            );
            self.handshake_timeout = Self::MAX_TIMEOUT;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Where the session is in its lifecycle.
///
/// ```text
///  NotConnected ──connect()──→ Connecting ──link up──→ PendingAuthentication
///       ↑                          │                           │
///       │                          │                    AuthResult{accept}
///       │                          │                           ▼
///       └──── disconnect() / any error, from any state ── Authenticated
/// ```
///
/// States only move forward within one attempt. Anything that ends the
/// attempt lands back in `NotConnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConnectionState {
    /// No link.
    NotConnected,
    /// A link was requested, the transport hasn't reported it up yet.
    Connecting,
    /// The link is up and our ticket is out; waiting for the host's answer.
    PendingAuthentication,
    /// The host accepted us.
    Authenticated,
}

impl ConnectionState {
    /// `true` in every state that owns a link.
    pub fn has_link(self) -> bool {
        self != ConnectionState::NotConnected
    }

    /// `true` where sending is allowed.
    pub fn can_send(self) -> bool {
        matches!(
            self,
            ConnectionState::PendingAuthentication
                | ConnectionState::Authenticated
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::NotConnected => "not connected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::PendingAuthentication => "pending authentication",
            ConnectionState::Authenticated => "authenticated",
        };
        f.write_str(name)
    }
}
