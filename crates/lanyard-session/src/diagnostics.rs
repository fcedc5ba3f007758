//! Diagnostic recording of envelopes crossing the session.
//!
//! The session reports every envelope it sends or accepts to a
//! [`DiagnosticSink`]. Two sinks ship with the crate:
//!
//! - [`MessageLog`]: a bounded ring buffer of recent envelopes. Clone
//!   the handle before installing it to read the log from outside.
//! - [`TracingSink`]: one `trace!` event per envelope.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use lanyard_protocol::MessageKind;
use lanyard_transport::ConnectionHandle;

/// Which way an envelope was travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received from a link.
    Inbound,
    /// Sent on a link.
    Outbound,
}

/// One recorded envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEntry {
    pub direction: Direction,
    pub handle: ConnectionHandle,
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

/// Receives a copy of every envelope the session sends or accepts.
pub trait DiagnosticSink {
    fn record(&mut self, entry: DiagnosticEntry);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Box<S> {
    fn record(&mut self, entry: DiagnosticEntry) {
        (**self).record(entry);
    }
}

// ---------------------------------------------------------------------------
// MessageLog
// ---------------------------------------------------------------------------

/// Bounded log of recent envelopes, oldest evicted first.
///
/// Cloning yields another handle to the same log.
#[derive(Debug, Clone)]
pub struct MessageLog {
    inner: Arc<Mutex<LogInner>>,
}

#[derive(Debug)]
struct LogInner {
    entries: VecDeque<DiagnosticEntry>,
    capacity: usize,
}

impl MessageLog {
    /// Creates a log holding at most `capacity` entries. 0 records nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogInner {
                entries: VecDeque::with_capacity(capacity),
                capacity,
            })),
        }
    }

    /// Snapshot of the logged entries, oldest first.
    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<DiagnosticEntry> {
        self.lock().entries.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DiagnosticSink for MessageLog {
    fn record(&mut self, entry: DiagnosticEntry) {
        let mut inner = self.lock();
        if inner.capacity == 0 {
            return;
        }
        if inner.entries.len() == inner.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
    }
}

// ---------------------------------------------------------------------------
// TracingSink
// ---------------------------------------------------------------------------

/// Emits each envelope as a `trace!` event. Payload bytes are not logged,
/// only their length.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&mut self, entry: DiagnosticEntry) {
        tracing::trace!(
            direction = ?entry.direction,
            handle = %entry.handle,
            kind = %entry.kind,
            len = entry.payload.len(),
            "envelope"
        );
    }
}
