//! Platform resources the engine drives but does not own.

use tracing::{debug, info};

use crate::model::Player;

/// Keeps the network up while the active player is playing.
pub trait WakeLock: Send + Sync {
    fn set_held(&self, held: bool);
}

/// Persistent "now playing" display for the active player.
pub trait NowPlayingSurface: Send + Sync {
    fn update(&self, player: &Player);
    fn clear(&self);
}

/// Wake lock for hosts with nothing to hold.
#[derive(Debug, Default)]
pub struct NoWakeLock;

impl WakeLock for NoWakeLock {
    fn set_held(&self, held: bool) {
        debug!("Wake lock {}", if held { "acquired" } else { "released" });
    }
}

/// Reports now-playing changes to the log.
#[derive(Debug, Default)]
pub struct LogNowPlaying;

impl NowPlayingSurface for LogNowPlaying {
    fn update(&self, player: &Player) {
        let state = &player.state;
        match &state.current_song {
            Some(song) => info!(
                "[{}] {} {} - {}",
                player.name,
                state.play_status.map(|s| s.as_str()).unwrap_or("?"),
                song.artist,
                song.name()
            ),
            None => info!("[{}] nothing playing", player.name),
        }
    }

    fn clear(&self) {
        debug!("Now playing cleared");
    }
}
