//! WebSocket client transport implementation using `tokio-tungstenite`.
//!
//! The session layer is synchronous and polled once per frame, while
//! WebSocket I/O is async. Each link therefore runs as its own Tokio
//! task, and the two sides talk over unbounded channels:
//!
//! ```text
//!  session ── send()/close() ──→ outbound mpsc ──→ link task ──→ socket
//!  session ←── poll_event() ←── events mpsc   ←── link task ←── socket
//! ```
//!
//! Nothing on the session side ever awaits; `poll_event` is a `try_recv`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::{
    Channel, ClientTransport, ConnectionHandle, TransportError,
    TransportEvent,
};

/// Counter for generating unique connection handles.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Settings for [`WebSocketTransport`].
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Largest single outbound message in bytes.
    ///
    /// Default: 512 KiB.
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 512 * 1024,
        }
    }
}

/// Commands from the session to a link task.
enum Outbound {
    Data(Vec<u8>),
    /// Close after everything queued before it has been written.
    Close,
}

struct Link {
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

/// A WebSocket-based [`ClientTransport`]. Targets are `ws://` / `wss://` URLs.
pub struct WebSocketTransport {
    runtime: Handle,
    config: WebSocketConfig,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    links: HashMap<ConnectionHandle, Link>,
}

impl WebSocketTransport {
    /// Creates a transport whose link tasks run on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self::with_config(runtime, WebSocketConfig::default())
    }

    /// Creates a transport with explicit settings.
    pub fn with_config(runtime: Handle, config: WebSocketConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            config,
            events_tx,
            events_rx,
            links: HashMap::new(),
        }
    }

    /// Creates a transport on the runtime of the calling context.
    ///
    /// # Errors
    /// Returns [`TransportError::Shutdown`] when called outside a Tokio
    /// runtime.
    pub fn current() -> Result<Self, TransportError> {
        let runtime =
            Handle::try_current().map_err(|_| TransportError::Shutdown)?;
        Ok(Self::new(runtime))
    }

    /// Number of links with a live task.
    pub fn open_links(&self) -> usize {
        self.links.len()
    }
}

impl ClientTransport for WebSocketTransport {
    type Target = str;

    fn connect(
        &mut self,
        target: &str,
    ) -> Result<ConnectionHandle, TransportError> {
        let handle = ConnectionHandle::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let task = self.runtime.spawn(run_link(
            handle,
            target.to_owned(),
            outbound_rx,
            self.events_tx.clone(),
        ));

        tracing::debug!(%handle, url = target, "websocket link requested");
        self.links.insert(
            handle,
            Link {
                outbound: outbound_tx,
                task,
            },
        );
        Ok(handle)
    }

    fn send(
        &mut self,
        handle: ConnectionHandle,
        data: &[u8],
        channel: Channel,
    ) -> Result<(), TransportError> {
        let link = self
            .links
            .get(&handle)
            .ok_or(TransportError::UnknownHandle(handle))?;

        if !channel.is_reliable() {
            tracing::trace!(%handle, "websocket has no unreliable channel, sending reliably");
        }

        link.outbound
            .send(Outbound::Data(data.to_vec()))
            .map_err(|_| {
                TransportError::ConnectionClosed(format!(
                    "{handle} link task has ended"
                ))
            })
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        let event = self.events_rx.try_recv().ok()?;
        if matches!(
            event,
            TransportEvent::LinkLost { .. } | TransportEvent::LinkError { .. }
        ) {
            // The task has already exited; drop our end of it.
            self.links.remove(&event.handle());
        }
        Some(event)
    }

    fn close(&mut self, handle: ConnectionHandle, flush: bool) {
        let Some(link) = self.links.remove(&handle) else {
            return;
        };
        if flush {
            // The outbound queue is FIFO, so Close lands after all data.
            if link.outbound.send(Outbound::Close).is_err() {
                link.task.abort();
            }
        } else {
            link.task.abort();
        }
        tracing::debug!(%handle, flush, "websocket link closed");
    }

    fn max_message_size(&self) -> usize {
        self.config.max_message_size
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        for (_, link) in self.links.drain() {
            link.task.abort();
        }
    }
}

/// Body of one link task: connect, then pump both directions until
/// either side closes.
async fn run_link(
    handle: ConnectionHandle,
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    // Send failures below mean the transport was dropped; nobody is
    // listening any more, so there is nothing to report to.
    let ws = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            tracing::debug!(%handle, %url, error = %e, "websocket connect failed");
            let _ = events.send(TransportEvent::LinkError {
                handle,
                error: TransportError::ConnectFailed(e.to_string()),
            });
            return;
        }
    };

    tracing::debug!(%handle, %url, "websocket link established");
    let _ = events.send(TransportEvent::LinkEstablished(handle));

    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            cmd = outbound.recv() => match cmd {
                Some(Outbound::Data(data)) => {
                    if let Err(e) = write.send(Message::Binary(data.into())).await {
                        let _ = events.send(TransportEvent::LinkError {
                            handle,
                            error: TransportError::SendFailed(
                                std::io::Error::new(
                                    std::io::ErrorKind::BrokenPipe,
                                    e,
                                ),
                            ),
                        });
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.close().await;
                    return;
                }
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Binary(data))) => {
                    let _ = events.send(TransportEvent::Data {
                        handle,
                        data: data.into(),
                    });
                }
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Data {
                        handle,
                        data: text.as_bytes().to_vec(),
                    });
                }
                Some(Ok(Message::Close(_))) | None => {
                    let _ = events.send(TransportEvent::LinkLost {
                        handle,
                        reason: "closed by remote".into(),
                    });
                    return;
                }
                Some(Ok(_)) => {} // ping/pong/raw frame
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::LinkError {
                        handle,
                        error: TransportError::ReceiveFailed(
                            std::io::Error::new(
                                std::io::ErrorKind::ConnectionReset,
                                e,
                            ),
                        ),
                    });
                    return;
                }
            },
        }
    }
}
