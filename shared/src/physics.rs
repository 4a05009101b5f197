//! Fixed-rate integrator for the shrinking-bar mechanic.
//!
//! Everything here is a pure function of player state and match settings,
//! so the authoritative server and any local practice driver advance
//! cursors with the same arithmetic.

use crate::protocol::GameEvent;
use crate::{
    MatchConfig, Player, MAX_DELTA_SECONDS, MAX_SPEED, SHIELD_INSET, SPEED_RAMP_ACCELERATION,
};

/// How a match ended once at most one cursor is still moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Winner(u32),
    Draw,
}

impl MatchOutcome {
    pub fn winner_id(self) -> Option<u32> {
        match self {
            MatchOutcome::Winner(id) => Some(id),
            MatchOutcome::Draw => None,
        }
    }
}

/// Turns a measured wall-clock gap into a usable step: never negative,
/// never larger than `MAX_DELTA_SECONDS`.
pub fn clamp_delta(dt: f64) -> f64 {
    if !dt.is_finite() || dt <= 0.0 {
        return 0.0;
    }
    dt.min(MAX_DELTA_SECONDS)
}

/// Advances one cursor by `dt` seconds.
///
/// Returns the event produced by a boundary collision, if any. Dead
/// players are left untouched.
pub fn advance_player(player: &mut Player, config: &MatchConfig, dt: f64) -> Option<GameEvent> {
    if !player.alive {
        return None;
    }

    if config.speed_ramp && player.speed < MAX_SPEED {
        player.speed = (player.speed + SPEED_RAMP_ACCELERATION * dt).min(MAX_SPEED);
    }

    let next_x = player.x + player.speed * player.direction.sign() * dt;
    let hit_min = next_x <= player.min_x;
    let hit_max = next_x >= player.max_x;

    if !hit_min && !hit_max {
        player.x = next_x;
        return None;
    }

    if player.shields > 0 {
        player.shields -= 1;
        player.direction = player.direction.flipped();

        // Narrow bars get the cursor centred instead of pushed past the far bound
        let inset = SHIELD_INSET.min(player.bar_width() / 2.0);
        player.x = if hit_min {
            player.min_x + inset
        } else {
            player.max_x - inset
        };

        Some(GameEvent::ShieldBreak {
            player_id: player.id,
        })
    } else {
        player.alive = false;
        Some(GameEvent::Death {
            player_id: player.id,
            x: player.x,
            color: player.color.clone(),
        })
    }
}

/// Advances every player in roster order and collects the resulting events.
pub fn advance_players<'a, I>(players: I, config: &MatchConfig, dt: f64) -> Vec<GameEvent>
where
    I: IntoIterator<Item = &'a mut Player>,
{
    players
        .into_iter()
        .filter_map(|player| advance_player(player, config, dt))
        .collect()
}

/// Returns the outcome once one or zero players remain alive.
pub fn check_winner<'a, I>(players: I) -> Option<MatchOutcome>
where
    I: IntoIterator<Item = &'a Player>,
{
    let mut survivors = players.into_iter().filter(|player| player.alive);

    match (survivors.next(), survivors.next()) {
        (Some(_), Some(_)) => None,
        (Some(last), None) => Some(MatchOutcome::Winner(last.id)),
        (None, _) => Some(MatchOutcome::Draw),
    }
}
