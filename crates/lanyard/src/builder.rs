//! `ClientBuilder`: one place to assemble a [`Client`] from its parts.

use std::time::Duration;

use lanyard_protocol::{Codec, JsonCodec, MessageKind};
use lanyard_session::{
    DiagnosticSink, IdentityProvider, MessageError, MessageHandler, MessageRouter, Session,
    SessionConfig,
};
use lanyard_tick::Client;
use lanyard_transport::{ClientTransport, TransportError, WebSocketConfig, WebSocketTransport};

use crate::LanyardError;

/// Builder for configuring a Lanyard [`Client`].
///
/// # Example
///
/// ```rust,ignore
/// use lanyard::prelude::*;
///
/// let mut client = ClientBuilder::new()
///     .handshake_timeout(Duration::from_secs(5))
///     .handler(CHAT, on_chat)
///     .build_websocket(LocalTicketIssuer::new())?;
/// client.connect("ws://127.0.0.1:8080")?;
/// ```
pub struct ClientBuilder {
    session_config: SessionConfig,
    websocket_config: WebSocketConfig,
    router: MessageRouter,
    diagnostics: Option<Box<dyn DiagnosticSink + Send>>,
    registration_error: Option<MessageError>,
}

impl ClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            session_config: SessionConfig::default(),
            websocket_config: WebSocketConfig::default(),
            router: MessageRouter::new(),
            diagnostics: None,
            registration_error: None,
        }
    }

    /// Sets the whole session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn link_timeout(mut self, timeout: Duration) -> Self {
        self.session_config.link_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.session_config.handshake_timeout = timeout;
        self
    }

    /// Settings for [`build_websocket`](Self::build_websocket). Ignored by
    /// the other build methods.
    pub fn websocket_config(mut self, config: WebSocketConfig) -> Self {
        self.websocket_config = config;
        self
    }

    /// Replaces the default [`MessageLog`](lanyard_session::MessageLog)
    /// diagnostic sink.
    pub fn diagnostics(mut self, sink: impl DiagnosticSink + Send + 'static) -> Self {
        self.diagnostics = Some(Box::new(sink));
        self
    }

    /// Registers a handler for a custom message kind.
    ///
    /// A registration error (a reserved kind) is reported by `build`.
    pub fn handler(mut self, kind: MessageKind, handler: impl MessageHandler + Send + 'static) -> Self {
        if let Err(err) = self.router.register(kind, handler) {
            self.registration_error.get_or_insert(err);
        }
        self
    }

    /// Builds a client over `transport` using [`JsonCodec`].
    ///
    /// # Errors
    /// [`MessageError::ReservedKind`] if a handler was registered for a
    /// kind the session handles itself.
    pub fn build<T, I>(self, transport: T, identity: I) -> Result<Client<T, I>, LanyardError>
    where
        T: ClientTransport,
        I: IdentityProvider,
    {
        self.build_with_codec(transport, identity, JsonCodec)
    }

    /// Builds a client with an explicit codec.
    ///
    /// # Errors
    /// As [`build`](Self::build).
    pub fn build_with_codec<T, I, C>(
        self,
        transport: T,
        identity: I,
        codec: C,
    ) -> Result<Client<T, I, C>, LanyardError>
    where
        T: ClientTransport,
        I: IdentityProvider,
        C: Codec,
    {
        if let Some(err) = self.registration_error {
            return Err(err.into());
        }

        let mut session = Session::new(transport, identity, codec, self.session_config);
        if let Some(sink) = self.diagnostics {
            session.set_diagnostics(sink);
        }
        tracing::debug!(config = ?session.config(), "client built");
        Ok(Client::with_router(session, self.router))
    }

    /// Builds a client over a [`WebSocketTransport`] running on the
    /// current Tokio runtime.
    ///
    /// # Errors
    /// [`TransportError::Shutdown`] outside a Tokio runtime, plus the
    /// errors of [`build`](Self::build).
    pub fn build_websocket<I>(self, identity: I) -> Result<Client<WebSocketTransport, I>, LanyardError>
    where
        I: IdentityProvider,
    {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TransportError::Shutdown)?;
        let transport = WebSocketTransport::with_config(runtime, self.websocket_config.clone());
        self.build(transport, identity)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
