//! Per-connection state: server facts learned during the handshake and the
//! known players.
//!
//! One `ConnectionState` exists per connection attempt. Dropping it is how a
//! disconnect forgets players, the active player and subscription levels.

use std::collections::HashMap;

use super::player::{Player, PlayerId};
use super::server_string::ServerString;

#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub host: String,
    pub cli_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    /// Web port for artwork and downloads, once `pref httpport ?` answers.
    pub http_port: Option<u16>,
    pub can_favorites: bool,
    pub can_musicfolder: bool,
    pub can_myapps: bool,
    pub can_randomplay: bool,
    pub preferred_album_sort: Option<String>,
    pub media_dirs: Vec<String>,
    pub server_version: Option<String>,
    pub server_strings: HashMap<ServerString, String>,

    players: HashMap<PlayerId, Player>,
    /// Listing order, for picking the first player.
    player_order: Vec<PlayerId>,
    active_player: Option<PlayerId>,
}

impl ConnectionState {
    pub fn new(
        host: impl Into<String>,
        cli_port: u16,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        Self {
            host: host.into(),
            cli_port,
            username,
            password,
            http_port: None,
            can_favorites: false,
            can_musicfolder: false,
            can_myapps: false,
            can_randomplay: false,
            preferred_album_sort: None,
            media_dirs: Vec::new(),
            server_version: None,
            server_strings: HashMap::new(),
            players: HashMap::new(),
            player_order: Vec::new(),
            active_player: None,
        }
    }

    /// Known players in listing order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.player_order.iter().filter_map(|id| self.players.get(id))
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.player_order.clone()
    }

    pub fn has_players(&self) -> bool {
        !self.players.is_empty()
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn first_player(&self) -> Option<&PlayerId> {
        self.player_order.first()
    }

    /// Forget every player and the active player.
    pub fn clear_players(&mut self) {
        self.players.clear();
        self.player_order.clear();
        self.active_player = None;
    }

    /// Add players from one page of a listing.
    pub fn add_players(&mut self, players: Vec<Player>) {
        for player in players {
            if !self.players.contains_key(&player.id) {
                self.player_order.push(player.id.clone());
            }
            self.players.insert(player.id.clone(), player);
        }
    }

    pub fn active_player_id(&self) -> Option<&PlayerId> {
        self.active_player.as_ref()
    }

    pub fn active_player(&self) -> Option<&Player> {
        self.active_player.as_ref().and_then(|id| self.players.get(id))
    }

    pub fn is_active(&self, id: &PlayerId) -> bool {
        self.active_player.as_ref() == Some(id)
    }

    /// Select the active player. Returns false for an id that is not a known
    /// player, leaving the selection unchanged.
    pub fn set_active_player(&mut self, id: Option<PlayerId>) -> bool {
        if let Some(id) = &id {
            if !self.players.contains_key(id) {
                return false;
            }
        }
        self.active_player = id;
        true
    }

    /// Base URL of the server's web interface, if the HTTP port is known.
    pub fn http_base(&self) -> Option<String> {
        self.http_port
            .filter(|port| *port != 0)
            .map(|port| format!("http://{}:{}", self.host, port))
    }
}
