use crate::protocol::GameEvent;
use crate::{Direction, Player, EXPAND_MARGIN, GRACE_MARGIN, PERFECT_THRESHOLD};

/// A bounce is perfect when the cursor is within the last 8% of the
/// remaining width before the edge it is heading to. An exact edge hit
/// does not count.
pub fn is_perfect(player: &Player) -> bool {
    let distance = player.distance_to_edge();
    distance > 0.0 && distance < player.bar_width() * PERFECT_THRESHOLD
}

/// Applies a bounce input to a live player.
///
/// A perfect bounce widens the bar by `EXPAND_MARGIN` on both sides; any
/// other bounce collapses the approached bound onto the cursor. Either way
/// the cursor is kept `GRACE_MARGIN` inside the new bounds and reverses.
///
/// A cut that would leave no width at all eliminates the player instead,
/// so a live player's bar is never empty.
pub fn apply_pivot(player: &mut Player) -> Option<GameEvent> {
    if !player.alive {
        return None;
    }

    let perfect = is_perfect(player);

    if perfect {
        player.min_x = (player.min_x - EXPAND_MARGIN).max(0.0);
        player.max_x = (player.max_x + EXPAND_MARGIN).min(1.0);
    } else {
        let (min_x, max_x) = match player.direction {
            Direction::Right => (player.min_x, player.x),
            Direction::Left => (player.x, player.max_x),
        };

        // Cut down to nothing: the cursor has no bar left to stand on
        if min_x >= max_x {
            player.alive = false;
            return Some(GameEvent::Death {
                player_id: player.id,
                x: player.x,
                color: player.color.clone(),
            });
        }

        player.min_x = min_x;
        player.max_x = max_x;
    }

    if player.bar_width() < GRACE_MARGIN * 2.0 {
        player.x = (player.min_x + player.max_x) / 2.0;
    } else {
        let pulled_back = player.x - GRACE_MARGIN * player.direction.sign();
        player.x = pulled_back
            .max(player.min_x + GRACE_MARGIN)
            .min(player.max_x - GRACE_MARGIN);
    }

    player.direction = player.direction.flipped();

    let (player_id, x, color) = (player.id, player.x, player.color.clone());
    Some(if perfect {
        GameEvent::Perfect {
            player_id,
            x,
            color,
        }
    } else {
        GameEvent::Bounce {
            player_id,
            x,
            color,
        }
    })
}
