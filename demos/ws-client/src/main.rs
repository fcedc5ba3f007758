use lanyard::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Game side
// ---------------------------------------------------------------------------

/// Custom kind for chat lines.
const CHAT: u16 = 0x0100;

#[derive(Serialize, Deserialize)]
struct Chat {
    text: String,
}

fn on_chat(source: ConnectionHandle, envelope: &MessageEnvelope) -> Result<(), MessageError> {
    let chat: Chat = envelope
        .decode_payload(&JsonCodec)
        .map_err(MessageError::MalformedPayload)?;
    info!(%source, text = %chat.text, "chat");
    Ok(())
}

/// Walks our player in a slow circle and reports everyone else's moves.
struct Drifter {
    me: PlayerId,
    angle: f32,
    /// Send a snapshot every this many network ticks.
    send_every: u64,
    others: Vec<PlayerData>,
}

impl Drifter {
    fn new(me: PlayerId) -> Self {
        Self {
            me,
            angle: 0.0,
            send_every: 3,
            others: Vec::new(),
        }
    }

    fn snapshot(&self) -> PlayerData {
        PlayerData {
            position: [self.angle.cos() * 5.0, 0.0, self.angle.sin() * 5.0],
            ..PlayerData::at_rest(self.me)
        }
    }
}

impl EntitySink for Drifter {
    fn apply_player_data(&mut self, data: &PlayerData) {
        if data.player == self.me {
            return;
        }
        match self.others.iter_mut().find(|o| o.player == data.player) {
            Some(known) => *known = *data,
            None => {
                info!(player = ?data.player, "new player in view");
                self.others.push(*data);
            }
        }
    }
}

impl ScriptHost for Drifter {
    fn on_network_tick(&mut self, ctx: &mut HookContext<'_>) {
        if ctx.state() != ConnectionState::Authenticated {
            return;
        }
        self.angle += 0.05;
        if ctx.frame() % self.send_every == 0 {
            ctx.queue_player_data(self.snapshot());
        }
    }
}

// ---------------------------------------------------------------------------
// Client bootstrap
// ---------------------------------------------------------------------------

fn build_client<T: ClientTransport>(transport: T) -> Result<Client<T, LocalTicketIssuer>, LanyardError> {
    let chat = MessageKind::custom(CHAT)?;
    ClientBuilder::new()
        .handshake_timeout(Duration::from_secs(5))
        .handler(chat, on_chat)
        .build(transport, LocalTicketIssuer::new())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info,lanyard_session=debug");

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:8080".to_string());
    info!(%url, "starting ws-client");

    let mut client = build_client(WebSocketTransport::current()?)?;
    let mut game = Drifter::new(PlayerId(1));
    let mut matchmaker = LocalMatchmaker::new();
    let mut driver = FrameDriver::new(FrameConfig::with_rate(30));
    let mut lobby_requested = false;

    client.connect(url.as_str())?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            frame = driver.wait_for_frame() => {
                let report = client.tick(&mut game, frame.now);
                driver.record_frame_end();

                match report.lobby {
                    Some(Ok(lobby)) => info!(%lobby, "lobby ready"),
                    Some(Err(error)) => warn!(%error, "lobby creation failed"),
                    None => {}
                }
                if let Some(failure) = report.failure {
                    warn!(%failure, "connection ended");
                    break;
                }
                if client.state() == ConnectionState::Authenticated && !lobby_requested {
                    client.create_lobby(&mut matchmaker, &LobbyParams::default())?;
                    lobby_requested = true;
                }
            }
        }
    }

    client.disconnect();
    info!(frames = driver.frame_count(), "bye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(kind: MessageKind, payload: &impl Serialize) -> Vec<u8> {
        MessageEnvelope::encode(&JsonCodec, kind, payload)
            .unwrap()
            .to_bytes(&JsonCodec)
            .unwrap()
    }

    fn authenticated() -> (Client<MemoryTransport, LocalTicketIssuer>, MemoryRemote, ConnectionHandle) {
        let (transport, remote) = MemoryTransport::pair();
        let mut client = build_client(transport).unwrap();
        let now = Instant::now();
        let handle = client.connect("host").unwrap();
        remote.establish(handle);
        let mut idle = Drifter::new(PlayerId(1));
        client.tick(&mut idle, now);
        remote.deliver(handle, bytes(MessageKind::AuthResult, &AuthResultMessage::accept()));
        client.tick(&mut idle, now);
        remote.take_sent();
        (client, remote, handle)
    }

    #[test]
    fn test_drifter_sends_every_third_frame_when_authenticated() {
        let (mut client, remote, _) = authenticated();
        let mut game = Drifter::new(PlayerId(1));

        for _ in 0..6 {
            client.tick(&mut game, Instant::now());
        }

        // Frames 3..=8 were ticked; 3 and 6 are multiples of three.
        assert_eq!(remote.sent().len(), 2);
    }

    #[test]
    fn test_drifter_tracks_other_players_only() {
        let (mut client, remote, handle) = authenticated();
        let mut game = Drifter::new(PlayerId(1));

        remote.deliver(handle, bytes(MessageKind::PlayerData, &PlayerData::at_rest(PlayerId(2))));
        remote.deliver(handle, bytes(MessageKind::PlayerData, &PlayerData::at_rest(PlayerId(1))));
        remote.deliver(handle, bytes(MessageKind::PlayerData, &PlayerData::at_rest(PlayerId(2))));
        client.tick(&mut game, Instant::now());

        assert_eq!(game.others.len(), 1);
        assert_eq!(game.others[0].player, PlayerId(2));
    }

    #[test]
    fn test_chat_routes_to_handler_and_bad_payload_drops() {
        let (mut client, remote, handle) = authenticated();
        let mut game = Drifter::new(PlayerId(1));
        let chat = MessageKind::custom(CHAT).unwrap();

        remote.deliver(handle, bytes(chat, &Chat { text: "gl hf".into() }));
        remote.deliver(handle, bytes(chat, &42));
        let report = client.tick(&mut game, Instant::now());

        assert_eq!(report.routed, 1);
        assert_eq!(report.dropped, 1);
    }
}
