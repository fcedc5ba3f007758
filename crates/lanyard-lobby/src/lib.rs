//! Asynchronous lobby creation for Lanyard clients.
//!
//! A lobby is a matchmaking-service object that players gather in before
//! (or while) connecting to a host. This crate covers creating one
//! without stalling the frame loop:
//!
//! - [`Matchmaker`]: the service, answering through a `oneshot` channel
//! - [`LobbyController`]: at most one request in flight, polled per frame
//! - [`LobbyCreationResult`] / [`LobbyError`]: what came back
//!
//! # How it fits in the stack
//!
//! ```text
//! Frame loop (lanyard-tick)  ← polls the controller once per frame
//!     ↕
//! Lobby layer (this crate)   ← request bookkeeping, result mapping
//!     ↕
//! Matchmaker (your service)  ← does the actual network round-trip
//! ```

mod controller;
mod error;
mod params;

pub use controller::{LobbyController, LocalMatchmaker, Matchmaker};
pub use error::LobbyError;
pub use params::{LobbyCreationResult, LobbyId, LobbyParams, LobbyVisibility};
