//! In-process transport: links that never touch a socket.
//!
//! [`MemoryTransport::pair`] returns two halves sharing one state:
//!
//! - the [`MemoryTransport`], handed to the session like any other
//!   [`ClientTransport`], and
//! - the [`MemoryRemote`], held by whoever plays the far end (a test,
//!   or a host running in the same process). It decides when links come
//!   up, what data arrives, and inspects what was sent.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    Channel, ClientTransport, ConnectionHandle, TransportError,
    TransportEvent,
};

/// Default message size limit, matching the WebSocket transport.
const DEFAULT_MAX_MESSAGE_SIZE: usize = 512 * 1024;

/// One message the session handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// Link it was sent on.
    pub handle: ConnectionHandle,
    /// Raw bytes.
    pub data: Vec<u8>,
    /// Requested delivery guarantee.
    pub channel: Channel,
}

#[derive(Debug)]
struct Shared {
    next_handle: u64,
    open: HashSet<ConnectionHandle>,
    events: VecDeque<TransportEvent>,
    connects: Vec<(ConnectionHandle, String)>,
    sent: Vec<SentFrame>,
    closed: Vec<(ConnectionHandle, bool)>,
    refuse_next: Option<String>,
    max_message_size: usize,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            next_handle: 1,
            open: HashSet::new(),
            events: VecDeque::new(),
            connects: Vec::new(),
            sent: Vec::new(),
            closed: Vec::new(),
            refuse_next: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // A panic while holding the lock can only come from a test assertion;
    // the data is still consistent, so keep going.
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

/// The session-facing half of an in-process link.
#[derive(Debug)]
pub struct MemoryTransport {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryTransport {
    /// Creates a transport and the remote half that drives it.
    pub fn pair() -> (MemoryTransport, MemoryRemote) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            MemoryTransport {
                shared: Arc::clone(&shared),
            },
            MemoryRemote { shared },
        )
    }
}

impl ClientTransport for MemoryTransport {
    type Target = str;

    fn connect(
        &mut self,
        target: &str,
    ) -> Result<ConnectionHandle, TransportError> {
        let mut shared = lock(&self.shared);
        if let Some(reason) = shared.refuse_next.take() {
            return Err(TransportError::ConnectFailed(reason));
        }

        let handle = ConnectionHandle::new(shared.next_handle);
        shared.next_handle += 1;
        shared.open.insert(handle);
        shared.connects.push((handle, target.to_owned()));

        tracing::trace!(%handle, target, "memory link requested");
        Ok(handle)
    }

    fn send(
        &mut self,
        handle: ConnectionHandle,
        data: &[u8],
        channel: Channel,
    ) -> Result<(), TransportError> {
        let mut shared = lock(&self.shared);
        if !shared.open.contains(&handle) {
            return Err(TransportError::UnknownHandle(handle));
        }
        shared.sent.push(SentFrame {
            handle,
            data: data.to_vec(),
            channel,
        });
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        lock(&self.shared).events.pop_front()
    }

    fn close(&mut self, handle: ConnectionHandle, flush: bool) {
        let mut shared = lock(&self.shared);
        if shared.open.remove(&handle) {
            shared.closed.push((handle, flush));
            tracing::trace!(%handle, flush, "memory link closed");
        }
    }

    fn max_message_size(&self) -> usize {
        lock(&self.shared).max_message_size
    }
}

// ---------------------------------------------------------------------------
// MemoryRemote
// ---------------------------------------------------------------------------

/// The far end of a [`MemoryTransport`].
///
/// Cheap to clone; every clone controls the same links.
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryRemote {
    /// Reports the link as established.
    pub fn establish(&self, handle: ConnectionHandle) {
        self.push(TransportEvent::LinkEstablished(handle));
    }

    /// Delivers one inbound message on `handle`.
    pub fn deliver(&self, handle: ConnectionHandle, data: Vec<u8>) {
        self.push(TransportEvent::Data { handle, data });
    }

    /// Reports the link as lost and forgets it.
    pub fn lose(&self, handle: ConnectionHandle, reason: &str) {
        let mut shared = lock(&self.shared);
        shared.open.remove(&handle);
        shared.events.push_back(TransportEvent::LinkLost {
            handle,
            reason: reason.to_owned(),
        });
    }

    /// Reports a link error and forgets the link.
    pub fn fail(&self, handle: ConnectionHandle, error: TransportError) {
        let mut shared = lock(&self.shared);
        shared.open.remove(&handle);
        shared
            .events
            .push_back(TransportEvent::LinkError { handle, error });
    }

    /// Makes the next `connect` call fail synchronously.
    pub fn refuse_next_connect(&self, reason: &str) {
        lock(&self.shared).refuse_next = Some(reason.to_owned());
    }

    /// Changes the size limit reported to the session.
    pub fn set_max_message_size(&self, size: usize) {
        lock(&self.shared).max_message_size = size;
    }

    /// Handle of the most recent successful `connect`.
    pub fn last_handle(&self) -> Option<ConnectionHandle> {
        lock(&self.shared).connects.last().map(|(h, _)| *h)
    }

    /// Every `(handle, target)` the session asked to connect to, in order.
    pub fn connects(&self) -> Vec<(ConnectionHandle, String)> {
        lock(&self.shared).connects.clone()
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<SentFrame> {
        lock(&self.shared).sent.clone()
    }

    /// Drains and returns everything sent so far.
    pub fn take_sent(&self) -> Vec<SentFrame> {
        std::mem::take(&mut lock(&self.shared).sent)
    }

    /// Every `(handle, flush)` close, in order.
    pub fn closed(&self) -> Vec<(ConnectionHandle, bool)> {
        lock(&self.shared).closed.clone()
    }

    /// Whether `handle` is currently open.
    pub fn is_open(&self, handle: ConnectionHandle) -> bool {
        lock(&self.shared).open.contains(&handle)
    }

    /// Number of events the transport has not handed out yet.
    pub fn pending_events(&self) -> usize {
        lock(&self.shared).events.len()
    }

    fn push(&self, event: TransportEvent) {
        lock(&self.shared).events.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_issues_fresh_handles() {
        let (mut transport, remote) = MemoryTransport::pair();

        let a = transport.connect("host-a").unwrap();
        let b = transport.connect("host-b").unwrap();

        assert_ne!(a, b);
        assert_eq!(remote.last_handle(), Some(b));
        assert_eq!(remote.connects()[0], (a, "host-a".to_string()));
    }

    #[test]
    fn test_connect_refused_returns_error() {
        let (mut transport, remote) = MemoryTransport::pair();
        remote.refuse_next_connect("no route");

        let result = transport.connect("host");

        assert!(matches!(result, Err(TransportError::ConnectFailed(r)) if r == "no route"));
        // Only the next connect is refused.
        assert!(transport.connect("host").is_ok());
    }

    #[test]
    fn test_events_are_polled_in_order() {
        let (mut transport, remote) = MemoryTransport::pair();
        let h = transport.connect("host").unwrap();

        remote.establish(h);
        remote.deliver(h, vec![1, 2]);

        assert!(matches!(
            transport.poll_event(),
            Some(TransportEvent::LinkEstablished(x)) if x == h
        ));
        assert!(matches!(
            transport.poll_event(),
            Some(TransportEvent::Data { data, .. }) if data == vec![1, 2]
        ));
        assert!(transport.poll_event().is_none());
    }

    #[test]
    fn test_send_on_closed_link_returns_unknown_handle() {
        let (mut transport, remote) = MemoryTransport::pair();
        let h = transport.connect("host").unwrap();
        transport.close(h, true);

        let result = transport.send(h, b"late", Channel::ReliableOrdered);

        assert!(matches!(result, Err(TransportError::UnknownHandle(x)) if x == h));
        assert!(remote.sent().is_empty());
        assert_eq!(remote.closed(), vec![(h, true)]);
    }

    #[test]
    fn test_close_twice_records_once() {
        let (mut transport, remote) = MemoryTransport::pair();
        let h = transport.connect("host").unwrap();

        transport.close(h, false);
        transport.close(h, false);

        assert_eq!(remote.closed(), vec![(h, false)]);
        assert!(!remote.is_open(h));
    }

    #[test]
    fn test_take_sent_drains_frames() {
        let (mut transport, remote) = MemoryTransport::pair();
        let h = transport.connect("host").unwrap();
        transport.send(h, b"a", Channel::Unreliable).unwrap();

        let frames = remote.take_sent();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].channel, Channel::Unreliable);
        assert!(remote.sent().is_empty());
    }
}
