//! The per-frame hooks a game implements, and the outbox they send through.

use std::collections::VecDeque;
use std::time::Instant;

use lanyard_protocol::{MessageKind, PlayerData};
use lanyard_session::{ConnectionState, EntitySink};
use lanyard_transport::Channel;

/// The game side of the frame loop.
///
/// Both hooks run once per frame, in this order, and only while the
/// session has a link (any state but `NotConnected`). They run after all
/// inbound data for the frame has been applied through
/// [`EntitySink::apply_player_data`].
///
/// ```rust
/// use lanyard_protocol::{PlayerData, PlayerId};
/// use lanyard_session::EntitySink;
/// use lanyard_tick::{HookContext, ScriptHost};
///
/// struct Ship {
///     me: PlayerData,
/// }
///
/// impl EntitySink for Ship {
///     fn apply_player_data(&mut self, data: &PlayerData) {
///         if data.player == self.me.player {
///             self.me = *data;
///         }
///     }
/// }
///
/// impl ScriptHost for Ship {
///     fn on_network_tick(&mut self, ctx: &mut HookContext<'_>) {
///         if ctx.state().can_send() {
///             ctx.queue_player_data(self.me);
///         }
///     }
/// }
///
/// let ship = Ship { me: PlayerData::at_rest(PlayerId(1)) };
/// # let _ = ship;
/// ```
pub trait ScriptHost: EntitySink {
    /// Network-rate logic: read input, queue outgoing state.
    fn on_network_tick(&mut self, ctx: &mut HookContext<'_>);

    /// Presentation: interpolate, animate. Default does nothing.
    fn on_presentation_update(&mut self, ctx: &mut HookContext<'_>) {
        let _ = ctx;
    }
}

/// What a hook can see and do during one frame.
#[derive(Debug)]
pub struct HookContext<'a> {
    frame: u64,
    now: Instant,
    state: ConnectionState,
    outbox: &'a mut Outbox,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(frame: u64, now: Instant, state: ConnectionState, outbox: &'a mut Outbox) -> Self {
        Self {
            frame,
            now,
            state,
            outbox,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// The session state when the hooks started.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Queues raw payload bytes; sent after both hooks return.
    pub fn queue_data(&mut self, kind: MessageKind, payload: Vec<u8>, channel: Channel) {
        self.outbox.push(Outgoing::Data {
            kind,
            payload,
            channel,
        });
    }

    /// Queues a local player snapshot; sent unreliably after both hooks
    /// return, then echoed into the entity sink.
    pub fn queue_player_data(&mut self, data: PlayerData) {
        self.outbox.push(Outgoing::PlayerData(data));
    }
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// One queued send.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Data {
        kind: MessageKind,
        payload: Vec<u8>,
        channel: Channel,
    },
    PlayerData(PlayerData),
}

/// Sends queued by hooks, flushed in order at the end of the frame.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<Outgoing>,
}

impl Outbox {
    pub fn push(&mut self, outgoing: Outgoing) {
        self.queue.push_back(outgoing);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Takes everything queued, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Outgoing> + '_ {
        self.queue.drain(..)
    }
}
