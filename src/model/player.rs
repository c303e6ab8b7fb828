//! Players known to the server.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::player_state::PlayerState;
use crate::protocol::token::{encode, TokenMap};

/// Decoded player identifier, usually the player's MAC address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Escaped form used in token[0] of player commands.
    pub fn encoded(&self) -> String {
        encode(&self.0)
    }
}

impl Borrow<str> for PlayerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One addressable playback endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub model: String,
    pub ip: String,
    pub can_power_off: bool,
    pub connected: bool,
    pub state: PlayerState,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            model: String::new(),
            ip: String::new(),
            can_power_off: false,
            connected: true,
            state: PlayerState::default(),
        }
    }

    /// Build a player from one record of a `players` listing.
    pub fn from_record(record: &TokenMap) -> Option<Self> {
        let id = record.get("playerid").filter(|id| !id.is_empty())?;
        let mut player = Player::new(id, record.get("name").unwrap_or(id));
        player.model = record.get("model").unwrap_or_default().to_string();
        player.ip = record.get("ip").unwrap_or_default().to_string();
        player.can_power_off = record.get_int_or_zero("canpoweroff") == 1;
        player.connected = record.get("connected").map_or(true, |c| c == "1");
        Some(player)
    }
}
