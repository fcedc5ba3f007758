//! The frame loop for Lanyard clients.
//!
//! [`Client::tick`] is called once per frame by the host application. In
//! one call it:
//!
//! ```text
//!   transport events ──→ Session ──→ MessageRouter ──→ EntitySink
//!   timers, lobby poll
//!   ScriptHost::on_network_tick ──→ on_presentation_update
//!   Outbox ──→ Session::send_data / send_player_data
//! ```
//!
//! and returns a [`TickReport`] describing what happened. Nothing in a
//! tick blocks; slow work (link I/O, lobby creation) happens elsewhere
//! and is only observed here.
//!
//! Hosts without their own render loop can pace `tick` with
//! [`FrameDriver`].

mod client;
mod frame;
mod hooks;
mod report;

pub use client::Client;
pub use frame::{FrameConfig, FrameDriver, FrameInfo, FrameMetrics, FramePolicy};
pub use hooks::{HookContext, Outbox, Outgoing, ScriptHost};
pub use report::TickReport;
