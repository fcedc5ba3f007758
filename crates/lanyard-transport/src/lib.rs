//! Client transport abstraction layer for Lanyard.
//!
//! Provides the [`ClientTransport`] trait: the point-to-point link
//! primitives the session layer drives (open a link, send bytes, poll
//! for events, close). Everything in here is non-blocking. The session
//! polls [`ClientTransport::poll_event`] once per frame instead of
//! awaiting a socket.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client transport via `tokio-tungstenite`
//!
//! The [`MemoryTransport`] is always available. It keeps links entirely
//! in-process and is what the test suites (and local single-process play)
//! use.

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryRemote, MemoryTransport, SentFrame};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketTransport};

use std::fmt;

/// Opaque reference to one transport-level link.
///
/// Handles are issued by the transport in [`ClientTransport::connect`]
/// and are never reused within a process, so a stale handle can always
/// be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    /// Creates a new `ConnectionHandle` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// The delivery guarantee requested for a single send.
///
/// Handshake traffic always goes out [`Channel::ReliableOrdered`]; the
/// per-frame player snapshot goes out [`Channel::Unreliable`] because
/// the latest value matters more than every value.
///
/// Transports that can't offer a weaker guarantee deliver reliably
/// instead. Reliable is always an acceptable substitute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Channel {
    /// Delivered in order, no loss.
    #[default]
    ReliableOrdered,

    /// Delivered (no loss), but may arrive out of order.
    ReliableUnordered,

    /// May be lost, may arrive out of order.
    Unreliable,
}

impl Channel {
    /// Returns `true` if the transport must not drop this send.
    pub fn is_reliable(self) -> bool {
        !matches!(self, Channel::Unreliable)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Something the transport observed since the last poll.
#[derive(Debug)]
pub enum TransportEvent {
    /// The link requested by `connect` is up and can carry data.
    LinkEstablished(ConnectionHandle),

    /// The link went away (remote closed, peer vanished).
    LinkLost {
        /// Which link.
        handle: ConnectionHandle,
        /// Human-readable cause, for logs.
        reason: String,
    },

    /// The link failed with an I/O or protocol error.
    LinkError {
        /// Which link.
        handle: ConnectionHandle,
        /// The underlying failure.
        error: TransportError,
    },

    /// One complete inbound message.
    Data {
        /// The link it arrived on.
        handle: ConnectionHandle,
        /// Raw message bytes (an encoded envelope).
        data: Vec<u8>,
    },
}

impl TransportEvent {
    /// The link this event belongs to.
    pub fn handle(&self) -> ConnectionHandle {
        match self {
            TransportEvent::LinkEstablished(handle) => *handle,
            TransportEvent::LinkLost { handle, .. }
            | TransportEvent::LinkError { handle, .. }
            | TransportEvent::Data { handle, .. } => *handle,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientTransport
// ---------------------------------------------------------------------------

/// The link primitives the session layer is built on.
///
/// Every method returns immediately. Link establishment, inbound data
/// and link failures are all reported later through
/// [`poll_event`](Self::poll_event).
pub trait ClientTransport {
    /// What a link is opened to: a URL, a platform user id, an address.
    type Target: ?Sized + fmt::Display;

    /// Starts opening a link to `target`.
    ///
    /// Returns the handle the eventual
    /// [`TransportEvent::LinkEstablished`] (or failure) will carry.
    /// An `Err` means the request was refused outright.
    fn connect(
        &mut self,
        target: &Self::Target,
    ) -> Result<ConnectionHandle, TransportError>;

    /// Queues `data` as one message on `handle`.
    fn send(
        &mut self,
        handle: ConnectionHandle,
        data: &[u8],
        channel: Channel,
    ) -> Result<(), TransportError>;

    /// Returns the next pending event, or `None` if nothing is waiting.
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// Closes `handle`. With `flush`, data already queued is delivered
    /// first; without it, queued data is discarded.
    ///
    /// Closing an unknown or already-closed handle is a no-op.
    fn close(&mut self, handle: ConnectionHandle, flush: bool);

    /// Largest single message, in bytes, that [`send`](Self::send) accepts.
    fn max_message_size(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_handle_new_and_into_inner() {
        let handle = ConnectionHandle::new(42);
        assert_eq!(handle.into_inner(), 42);
    }

    #[test]
    fn test_connection_handle_display() {
        assert_eq!(ConnectionHandle::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_handle_hash_works_as_set_member() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ConnectionHandle::new(1));
        set.insert(ConnectionHandle::new(1));
        set.insert(ConnectionHandle::new(2));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_channel_default_is_reliable_ordered() {
        assert_eq!(Channel::default(), Channel::ReliableOrdered);
    }

    #[test]
    fn test_channel_is_reliable() {
        assert!(Channel::ReliableOrdered.is_reliable());
        assert!(Channel::ReliableUnordered.is_reliable());
        assert!(!Channel::Unreliable.is_reliable());
    }

    #[test]
    fn test_event_handle_reports_owning_link() {
        let h = ConnectionHandle::new(3);
        let events = [
            TransportEvent::LinkEstablished(h),
            TransportEvent::LinkLost {
                handle: h,
                reason: "gone".into(),
            },
            TransportEvent::LinkError {
                handle: h,
                error: TransportError::Shutdown,
            },
            TransportEvent::Data {
                handle: h,
                data: vec![1],
            },
        ];
        for event in &events {
            assert_eq!(event.handle(), h);
        }
    }
}
