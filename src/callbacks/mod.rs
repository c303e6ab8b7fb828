//! Observer interfaces and the registries that fan state changes out to them.
//!
//! Each observer kind has its own [`Registry`]. Observers are registered on
//! behalf of a [`ClientId`] so a component being torn down can drop all of its
//! observers in one call with [`Callbacks::cancel_subscriptions`].

mod registry;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use registry::Registry;

use crate::model::{PlayStatus, Player, PlayerState};
use crate::service::items::ItemBatch;

/// Identity of a logical client (a screen, a widget, the CLI binary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Allocate a fresh process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

// =============================================================================
// Observer traits
// =============================================================================

pub trait ConnectionCallback: Send + Sync {
    /// `post_connect` is true once a connection attempt has been resolved
    /// (transport opened or failed to open). `login_failed` is set when the
    /// server closed the link before the handshake completed.
    fn on_connection_changed(&self, is_connected: bool, post_connect: bool, login_failed: bool);
}

pub trait PlayersCallback: Send + Sync {
    fn on_players_changed(&self, players: &[Player], active: Option<&Player>);
}

pub trait VolumeCallback: Send + Sync {
    /// Receive volume changes for every player, not only the active one.
    fn want_all_players(&self) -> bool {
        false
    }

    fn on_volume_changed(&self, volume: i32, player: &Player);
}

pub trait CurrentPlaylistCallback: Send + Sync {
    fn on_add_tracks(&self, state: &PlayerState);
    fn on_delete(&self, state: &PlayerState, index: i32);
}

pub trait MusicChangedCallback: Send + Sync {
    fn on_music_changed(&self, state: &PlayerState);
}

pub trait HandshakeCallback: Send + Sync {
    fn on_handshake_completed(&self);
}

pub trait PlaylistMaintenanceCallback: Send + Sync {
    /// A playlist named `name` already exists.
    fn on_create_failed(&self, name: &str);
    fn on_rename_failed(&self, new_name: &str);
}

pub trait PlayerStateCallback: Send + Sync {
    fn on_player_state_received(&self, player: &Player);
}

/// Active-player notifications. Every method defaults to a no-op.
pub trait ServiceCallback: Send + Sync {
    fn on_play_status_changed(&self, _status: PlayStatus) {}

    /// `was_unknown` is true the first time shuffle is observed.
    fn on_shuffle_status_changed(&self, _was_unknown: bool, _shuffle_id: i32) {}

    fn on_repeat_status_changed(&self, _was_unknown: bool, _repeat_id: i32) {}

    fn on_time_in_song_change(&self, _elapsed_secs: i32, _duration_secs: i32) {}

    fn on_power_status_changed(&self, _can_power_on: bool, _can_power_off: bool) {}
}

/// Receives pages of an item-list request.
pub trait ItemListCallback: Send + Sync {
    fn on_items_received(&self, batch: ItemBatch);
}

// =============================================================================
// Callbacks
// =============================================================================

/// All observer registries of one client engine.
#[derive(Default)]
pub struct Callbacks {
    pub connection: Registry<dyn ConnectionCallback>,
    pub players: Registry<dyn PlayersCallback>,
    pub volume: Registry<dyn VolumeCallback>,
    pub current_playlist: Registry<dyn CurrentPlaylistCallback>,
    pub music_changed: Registry<dyn MusicChangedCallback>,
    pub handshake: Registry<dyn HandshakeCallback>,
    pub playlist_maintenance: Registry<dyn PlaylistMaintenanceCallback>,
    pub player_state: Registry<dyn PlayerStateCallback>,
    pub service: Registry<dyn ServiceCallback>,
}

pub type SharedCallbacks = Arc<Callbacks>;

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every observer owned by `client` from every registry.
    pub fn cancel_subscriptions(&self, client: ClientId) -> usize {
        self.connection.remove_client(client)
            + self.players.remove_client(client)
            + self.volume.remove_client(client)
            + self.current_playlist.remove_client(client)
            + self.music_changed.remove_client(client)
            + self.handshake.remove_client(client)
            + self.playlist_maintenance.remove_client(client)
            + self.player_state.remove_client(client)
            + self.service.remove_client(client)
    }
}
