use serde::{Deserialize, Serialize};

pub mod physics;
pub mod pivot;
pub mod player;
pub mod protocol;

pub use physics::{advance_player, advance_players, check_winner, clamp_delta, MatchOutcome};
pub use pivot::{apply_pivot, is_perfect};
pub use player::{player_color, Player};
pub use protocol::{ClientPacket, GameEvent, PlayerSnapshot, PlayerSummary, ServerPacket};

pub const PERFECT_THRESHOLD: f64 = 0.08;
pub const EXPAND_MARGIN: f64 = 0.05;
pub const GRACE_MARGIN: f64 = 0.02;
pub const SHIELD_INSET: f64 = 0.02;
pub const SPEED_RAMP_ACCELERATION: f64 = 0.03;
pub const MAX_SPEED: f64 = 2.0;
pub const STARTING_SHIELDS: u32 = 1;
pub const MAX_PLAYERS: usize = 4;
pub const MIN_PLAYERS: usize = 2;
pub const TICK_RATE: u32 = 60;
/// Upper bound for a single integration step, applied after the tick loop stalls.
pub const MAX_DELTA_SECONDS: f64 = 0.05;

pub const PLAYER_COLORS: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#FFE66D", "#95E1D3", "#F38181", "#AA96DA", "#FCBAD3", "#A8D8EA",
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    /// Base cursor speed in bar widths per second.
    pub fn base_speed(self) -> f64 {
        match self {
            Difficulty::Easy => 0.2,
            Difficulty::Normal => 0.35,
            Difficulty::Hard => 0.55,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Left => -1.0,
            Direction::Right => 1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// Per-match settings. Only mutable while the room is waiting for a start.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    pub difficulty: Difficulty,
    pub speed_ramp: bool,
}
