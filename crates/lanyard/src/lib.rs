//! # Lanyard
//!
//! Client session layer for networked games.
//!
//! Lanyard owns the client side of a game connection: opening the link,
//! presenting an identity ticket, routing inbound envelopes to the game,
//! and driving everything from the host's frame loop. The game implements
//! [`ScriptHost`](lanyard_tick::ScriptHost) and calls
//! [`Client::tick`](lanyard_tick::Client::tick) once per frame.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lanyard::prelude::*;
//!
//! // Implement ScriptHost for your game, then:
//! // let mut client = ClientBuilder::new().build_websocket(LocalTicketIssuer::new())?;
//! // client.connect("ws://127.0.0.1:8080")?;
//! // loop {
//! //     let frame = driver.wait_for_frame().await;
//! //     let report = client.tick(&mut game, frame.now);
//! // }
//! ```

mod builder;
mod error;

pub use builder::ClientBuilder;
pub use error::LanyardError;

pub use lanyard_lobby as lobby;
pub use lanyard_protocol as protocol;
pub use lanyard_session as session;
pub use lanyard_tick as tick;
pub use lanyard_transport as transport;

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (e.g. `"info,lanyard_session=debug"`).
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

pub mod prelude {
    //! Everything a game client usually needs.

    pub use std::time::{Duration, Instant};

    pub use crate::{ClientBuilder, LanyardError, init_tracing};
    pub use lanyard_lobby::{
        LobbyController, LobbyCreationResult, LobbyError, LobbyId, LobbyParams, LobbyVisibility,
        LocalMatchmaker, Matchmaker,
    };
    pub use lanyard_protocol::{
        AuthResultMessage, Codec, JsonCodec, MessageEnvelope, MessageKind, PlayerData, PlayerId,
    };
    pub use lanyard_session::{
        AuthError, ConnectionError, ConnectionState, EntitySink, IdentityProvider,
        LocalTicketIssuer, MessageError, MessageLog, MessageRouter, Origin, Session,
        SessionConfig, SessionError,
    };
    pub use lanyard_tick::{
        Client, FrameConfig, FrameDriver, FrameInfo, FramePolicy, HookContext, ScriptHost,
        TickReport,
    };
    pub use lanyard_transport::{
        Channel, ClientTransport, ConnectionHandle, MemoryRemote, MemoryTransport,
        TransportError, WebSocketConfig, WebSocketTransport,
    };
}
