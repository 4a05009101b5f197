//! Message vocabulary exchanged over each participant's WebSocket.
//!
//! Both directions are JSON objects tagged by a `type` field, e.g.
//! `{"type":"INPUT"}` or `{"type":"WELCOME","playerId":1}`.

use crate::Difficulty;
use serde::{Deserialize, Serialize};

/// Client to server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientPacket {
    Start,
    Input,
    Rematch,
    SetDifficulty { difficulty: Difficulty },
    ToggleSpeedRamp { enabled: bool },
}

impl ClientPacket {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Server to client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerPacket {
    Welcome {
        player_id: u32,
    },
    Error {
        msg: String,
    },
    PlayerList {
        players: Vec<PlayerSummary>,
    },
    Settings {
        difficulty: Difficulty,
        speed_ramp: bool,
    },
    GameStart,
    Update {
        state: Vec<PlayerSnapshot>,
    },
    Event {
        payload: GameEvent,
    },
    GameOver {
        winner_id: Option<u32>,
    },
    MatchAborted {
        reason: String,
    },
}

impl ServerPacket {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Discrete gameplay events, broadcast as soon as they happen so clients
/// can play effects at the right spot.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(
    tag = "name",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum GameEvent {
    Bounce { player_id: u32, x: f64, color: String },
    Perfect { player_id: u32, x: f64, color: String },
    ShieldBreak { player_id: u32 },
    Death { player_id: u32, x: f64, color: String },
}

impl GameEvent {
    pub fn player_id(&self) -> u32 {
        match self {
            GameEvent::Bounce { player_id, .. }
            | GameEvent::Perfect { player_id, .. }
            | GameEvent::ShieldBreak { player_id }
            | GameEvent::Death { player_id, .. } => *player_id,
        }
    }
}

/// Per-tick view of one participant, alive or not.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: u32,
    pub x: f64,
    pub min_x: f64,
    pub max_x: f64,
    pub alive: bool,
    pub shields: u32,
    pub color: String,
}

/// Roster entry shown in the lobby.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerSummary {
    pub id: u32,
    pub color: String,
}
