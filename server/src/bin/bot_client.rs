//! Headless player that joins a running server and plays by itself.
//!
//! Useful for filling a lobby when testing with a single human, or for
//! watching a room with `RUST_LOG=info`.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use rand::Rng;
use server::cli::DifficultyArg;
use shared::{
    is_perfect, ClientPacket, Difficulty, Direction, Player, PlayerSnapshot, ServerPacket,
};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Chance (0.0-1.0) of bouncing when the cursor enters the perfect window
    #[arg(short = 'k', long, default_value = "0.8")]
    skill: f64,

    /// Send START once this many players are in the lobby (0 disables)
    #[arg(long, default_value = "2")]
    start_at: usize,

    /// Ask for a rematch after every game
    #[arg(long)]
    rematch: bool,

    /// Difficulty to request in the lobby
    #[arg(short, long, value_enum)]
    difficulty: Option<DifficultyArg>,

    /// Request the speed ramp in the lobby
    #[arg(long)]
    speed_ramp: Option<bool>,
}

/// What the bot remembers about its own cursor between snapshots.
struct BotState {
    player_id: Option<u32>,
    last_x: Option<f64>,
    // Direction of travel at the moment of the last bounce, if one was sent
    bounced_towards: Option<Direction>,
}

impl BotState {
    fn new() -> Self {
        Self {
            player_id: None,
            last_x: None,
            bounced_towards: None,
        }
    }

    /// Decides whether to bounce given this tick's snapshot of our cursor.
    fn should_bounce(&mut self, snapshot: &PlayerSnapshot, skill: f64, rng: &mut impl Rng) -> bool {
        let previous = self.last_x.replace(snapshot.x);
        let Some(previous) = previous else {
            return false;
        };
        if !snapshot.alive || snapshot.x == previous {
            return false;
        }

        let direction = if snapshot.x > previous {
            Direction::Right
        } else {
            Direction::Left
        };
        if self.bounced_towards == Some(direction) {
            return false;
        }

        let mut player = Player::new(snapshot.id, Difficulty::Normal);
        player.x = snapshot.x;
        player.min_x = snapshot.min_x;
        player.max_x = snapshot.max_x;
        player.direction = direction;

        if is_perfect(&player) && rng.gen_bool(skill.clamp(0.0, 1.0)) {
            self.bounced_towards = Some(direction);
            return true;
        }
        self.bounced_towards = None;
        false
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let mut rng = rand::thread_rng();

    info!("Connecting to {}", args.server);
    let (ws_stream, _) = connect_async(args.server.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    let mut lobby_packets = Vec::new();
    if let Some(difficulty) = args.difficulty {
        lobby_packets.push(ClientPacket::SetDifficulty {
            difficulty: difficulty.into(),
        });
    }
    if let Some(enabled) = args.speed_ramp {
        lobby_packets.push(ClientPacket::ToggleSpeedRamp { enabled });
    }

    let mut bot = BotState::new();
    let mut start_requested = false;

    while let Some(frame) = read.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let packet = match ServerPacket::from_json(&text) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Unreadable packet from server: {}", e);
                continue;
            }
        };

        let mut replies = Vec::new();
        match packet {
            ServerPacket::Welcome { player_id } => {
                info!("Joined as player {}", player_id);
                bot.player_id = Some(player_id);
                replies.append(&mut lobby_packets);
            }
            ServerPacket::Error { msg } => {
                warn!("Server refused us: {}", msg);
            }
            ServerPacket::PlayerList { players } => {
                info!("Lobby: {} players", players.len());
                if args.start_at > 0 && players.len() >= args.start_at && !start_requested {
                    start_requested = true;
                    replies.push(ClientPacket::Start);
                }
            }
            ServerPacket::Settings {
                difficulty,
                speed_ramp,
            } => {
                info!("Settings: {:?}, speed ramp {}", difficulty, speed_ramp);
            }
            ServerPacket::GameStart => {
                info!("Game started");
                bot = BotState {
                    player_id: bot.player_id,
                    ..BotState::new()
                };
            }
            ServerPacket::Update { state } => {
                let own = state
                    .iter()
                    .find(|snapshot| Some(snapshot.id) == bot.player_id);
                if let Some(snapshot) = own {
                    if bot.should_bounce(snapshot, args.skill, &mut rng) {
                        replies.push(ClientPacket::Input);
                    }
                }
            }
            ServerPacket::Event { payload } => {
                info!("Event: {:?}", payload);
            }
            ServerPacket::GameOver { winner_id } => {
                match winner_id {
                    Some(id) if Some(id) == bot.player_id => info!("We won!"),
                    Some(id) => info!("Player {} won", id),
                    None => info!("Draw"),
                }
                if args.rematch {
                    replies.push(ClientPacket::Rematch);
                }
            }
            ServerPacket::MatchAborted { reason } => {
                info!("Match aborted: {}", reason);
                start_requested = false;
            }
        }

        for reply in replies {
            write.send(Message::Text(reply.to_json()?)).await?;
        }
    }

    info!("Disconnected");
    Ok(())
}
