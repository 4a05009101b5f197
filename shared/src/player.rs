use crate::protocol::{PlayerSnapshot, PlayerSummary};
use crate::{Difficulty, Direction, PLAYER_COLORS, STARTING_SHIELDS};

/// Authoritative state of one participant's cursor and bar.
///
/// Bounds hold `0 <= min_x < max_x <= 1` and `min_x <= x <= max_x` for as
/// long as the player is alive. A dead player keeps its last position so
/// clients can keep drawing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: u32,
    pub color: String,
    pub x: f64,
    pub min_x: f64,
    pub max_x: f64,
    pub direction: Direction,
    pub speed: f64,
    pub shields: u32,
    pub alive: bool,
}

impl Player {
    pub fn new(id: u32, difficulty: Difficulty) -> Self {
        Self {
            id,
            color: player_color(id).to_string(),
            x: 0.5,
            min_x: 0.0,
            max_x: 1.0,
            direction: Direction::Right,
            speed: difficulty.base_speed(),
            shields: STARTING_SHIELDS,
            alive: true,
        }
    }

    /// Puts the player back at the centre of a full bar for a new match.
    pub fn reset(&mut self, difficulty: Difficulty, direction: Direction) {
        self.x = 0.5;
        self.min_x = 0.0;
        self.max_x = 1.0;
        self.direction = direction;
        self.speed = difficulty.base_speed();
        self.shields = STARTING_SHIELDS;
        self.alive = true;
    }

    pub fn bar_width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Distance from the cursor to the bound it is currently moving towards.
    pub fn distance_to_edge(&self) -> f64 {
        match self.direction {
            Direction::Right => self.max_x - self.x,
            Direction::Left => self.x - self.min_x,
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            x: self.x,
            min_x: self.min_x,
            max_x: self.max_x,
            alive: self.alive,
            shields: self.shields,
            color: self.color.clone(),
        }
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id,
            color: self.color.clone(),
        }
    }
}

/// Display color for a player id, cycling through the palette.
pub fn player_color(id: u32) -> &'static str {
    let index = (id.max(1) as usize - 1) % PLAYER_COLORS.len();
    PLAYER_COLORS[index]
}
