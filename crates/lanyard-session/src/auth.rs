//! Identity hook for obtaining and revoking auth tickets.
//!
//! Lanyard doesn't talk to any identity backend itself. Whatever platform
//! service vouches for the local player (a storefront SDK, an OAuth
//! token exchange, a signed JWT from your own server) sits behind the
//! [`IdentityProvider`] trait: one call to issue a ticket when a link
//! comes up, one call to give it back when the link goes away.
//!
//! # Ticket lifetime
//!
//! ```text
//!   link established ──→ issue_ticket() ──→ AuthTicket sent to host
//!                                                │
//!            ┌───────────────────────────────────┤
//!            ▼                                   ▼
//!   rejected / timeout / lost            accepted: held while
//!            │                           Authenticated
//!            ▼                                   │
//!      revoke_ticket()  ◄──── disconnect / link lost
//! ```
//!
//! [`AuthTicket`] is deliberately not `Clone`: the session owns the one
//! copy and hands it back by value, so a ticket can't be revoked twice
//! or outlive the connection that used it.

use std::collections::HashSet;
use std::fmt;

use rand::RngCore;

use crate::AuthError;

// ---------------------------------------------------------------------------
// AuthTicket
// ---------------------------------------------------------------------------

/// Identifies one issued ticket for revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketId(pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket-{}", self.0)
    }
}

/// An opaque credential proving the local player's identity to a host.
pub struct AuthTicket {
    id: TicketId,
    data: Vec<u8>,
}

impl AuthTicket {
    /// Wraps ticket bytes issued by a provider.
    pub fn new(id: TicketId, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    /// The ticket's id.
    pub fn id(&self) -> TicketId {
        self.id
    }

    /// Raw ticket bytes, as sent to the host.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

// Ticket bytes are credentials; keep them out of logs.
impl fmt::Debug for AuthTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTicket")
            .field("id", &self.id)
            .field("len", &self.data.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// IdentityProvider
// ---------------------------------------------------------------------------

/// Issues and revokes auth tickets for the local player.
///
/// Both calls are made from the frame thread and must not block. A
/// provider whose backend is slow should keep a ticket ready ahead of
/// time and return [`AuthError::TicketUnavailable`] when it has none.
///
/// # Example
///
/// ```rust
/// use lanyard_session::{AuthError, AuthTicket, IdentityProvider, TicketId};
///
/// /// Hands out a fixed development token.
/// struct DevIdentity;
///
/// impl IdentityProvider for DevIdentity {
///     fn issue_ticket(&mut self) -> Result<AuthTicket, AuthError> {
///         Ok(AuthTicket::new(TicketId(1), b"dev-token".to_vec()))
///     }
///
///     fn revoke_ticket(&mut self, _ticket: AuthTicket) {}
/// }
///
/// let mut identity = DevIdentity;
/// let ticket = identity.issue_ticket().unwrap();
/// assert_eq!(ticket.as_bytes(), b"dev-token");
/// identity.revoke_ticket(ticket);
/// ```
pub trait IdentityProvider {
    /// Produces a ticket for the host to validate.
    ///
    /// # Errors
    /// [`AuthError::TicketUnavailable`] if no ticket can be produced
    /// right now. The connection attempt fails with that error.
    fn issue_ticket(&mut self) -> Result<AuthTicket, AuthError>;

    /// Invalidates a ticket the session no longer needs.
    fn revoke_ticket(&mut self, ticket: AuthTicket);
}

// ---------------------------------------------------------------------------
// LocalTicketIssuer
// ---------------------------------------------------------------------------

/// Random 16-byte tickets with no backend behind them.
///
/// Meant for LAN play, tests and demos where the host accepts any
/// well-formed ticket. Tracks which tickets are still outstanding so
/// tests can check that every issued ticket was revoked.
#[derive(Debug, Default)]
pub struct LocalTicketIssuer {
    next_id: u64,
    outstanding: HashSet<TicketId>,
    unavailable: Option<String>,
}

impl LocalTicketIssuer {
    /// Size of each generated ticket in bytes.
    pub const TICKET_LEN: usize = 16;

    /// Creates an issuer with no outstanding tickets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `issue_ticket` call fail with `reason`
    /// until [`set_available`](Self::set_available) is called.
    pub fn set_unavailable(&mut self, reason: impl Into<String>) {
        self.unavailable = Some(reason.into());
    }

    /// Undoes [`set_unavailable`](Self::set_unavailable).
    pub fn set_available(&mut self) {
        self.unavailable = None;
    }

    /// Tickets issued and not yet revoked.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Total tickets issued so far.
    pub fn issued(&self) -> u64 {
        self.next_id
    }
}

impl IdentityProvider for LocalTicketIssuer {
    fn issue_ticket(&mut self) -> Result<AuthTicket, AuthError> {
        if let Some(reason) = &self.unavailable {
            return Err(AuthError::TicketUnavailable(reason.clone()));
        }

        self.next_id += 1;
        let id = TicketId(self.next_id);
        let mut data = vec![0u8; Self::TICKET_LEN];
        rand::rng().fill_bytes(&mut data);

        self.outstanding.insert(id);
        tracing::debug!(%id, "issued local auth ticket");
        Ok(AuthTicket::new(id, data))
    }

    fn revoke_ticket(&mut self, ticket: AuthTicket) {
        if self.outstanding.remove(&ticket.id()) {
            tracing::debug!(id = %ticket.id(), "revoked local auth ticket");
        } else {
            tracing::warn!(id = %ticket.id(), "revoking a ticket this issuer never issued");
        }
    }
}
