//! Per-player status subscription levels.

use crate::model::{PlayerId, SubscriptionLevel};
use crate::protocol::SONG_TAGS;

/// Level of status updates a player needs given who is listening.
///
/// A player counting down a sleep timer needs real-time updates: the server
/// does not send on-change updates while `will_sleep_in` ticks.
pub fn required_level(
    is_active: bool,
    sleep: i32,
    player_state_subscribers: usize,
    generic_subscribers: usize,
) -> SubscriptionLevel {
    let interested = player_state_subscribers > 0 || (generic_subscribers > 0 && is_active);
    if !interested {
        SubscriptionLevel::None
    } else if is_active || sleep > 0 {
        SubscriptionLevel::RealTime
    } else {
        SubscriptionLevel::OnChange
    }
}

/// Command that moves a player to `level`.
pub fn subscription_command(player: &PlayerId, level: SubscriptionLevel) -> String {
    format!(
        "{} status - 1 subscribe:{} tags:{}",
        player.encoded(),
        level.token(),
        SONG_TAGS
    )
}

/// Command fetching a player's status once, without changing its subscription.
pub fn status_command(player: &PlayerId) -> String {
    format!("{} status - 1 tags:{}", player.encoded(), SONG_TAGS)
}
