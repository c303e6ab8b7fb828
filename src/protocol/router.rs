//! Five-tier line router.
//!
//! A line is matched against the tiers in a fixed order and the first hit
//! wins. Tables are built once from the hand-coded handler list plus
//! [`QUERY_COMMANDS`]; dispatching a line is a handful of hash lookups.

use std::collections::HashMap;

use tracing::trace;

use super::query::{QueryCommand, Routing, Tier, QUERY_COMMANDS};
use super::token::decode;

/// Hand-coded line handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    // Global
    Login,
    Version,
    GetString,
    Pref,
    Can,
    Playlists,
    // Global player-specific
    Client,
    Status,
    Prefset,
    // Player-specific (active player only)
    Play,
    Stop,
    Pause,
    Playlist,
}

/// What a line is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Handler(Handler),
    Query(&'static QueryCommand),
}

const GLOBAL_HANDLERS: &[(&str, Handler)] = &[
    ("login", Handler::Login),
    ("version", Handler::Version),
    ("getstring", Handler::GetString),
    ("pref", Handler::Pref),
    ("can", Handler::Can),
    ("playlists", Handler::Playlists),
];

const GLOBAL_PLAYER_HANDLERS: &[(&str, Handler)] = &[
    ("client", Handler::Client),
    ("status", Handler::Status),
    ("prefset", Handler::Prefset),
];

const PLAYER_HANDLERS: &[(&str, Handler)] = &[
    ("play", Handler::Play),
    ("stop", Handler::Stop),
    ("pause", Handler::Pause),
    ("playlist", Handler::Playlist),
];

type Table = HashMap<&'static str, Route>;

/// Static dispatch tables, one per tier.
#[derive(Debug)]
pub struct Router {
    global: Table,
    prefixed: Table,
    global_player: Table,
    player: Table,
    prefixed_player: Table,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        let handlers = |entries: &[(&'static str, Handler)]| -> Table {
            entries
                .iter()
                .map(|(key, handler)| (*key, Route::Handler(*handler)))
                .collect()
        };

        let mut router = Self {
            global: handlers(GLOBAL_HANDLERS),
            prefixed: Table::new(),
            global_player: handlers(GLOBAL_PLAYER_HANDLERS),
            player: handlers(PLAYER_HANDLERS),
            prefixed_player: Table::new(),
        };

        for query in QUERY_COMMANDS {
            let Routing::Table(tier) = query.routing else {
                continue;
            };
            router
                .table_mut(tier)
                .entry(query.routing_key())
                .or_insert(Route::Query(query));
        }

        router
    }

    fn table_mut(&mut self, tier: Tier) -> &mut Table {
        match tier {
            Tier::Global => &mut self.global,
            Tier::Prefixed => &mut self.prefixed,
            Tier::GlobalPlayerSpecific => &mut self.global_player,
            Tier::PlayerSpecific => &mut self.player,
            Tier::PrefixedPlayerSpecific => &mut self.prefixed_player,
        }
    }

    /// Classify a tokenized line.
    ///
    /// Tiers 4 and 5 are only consulted when token[0] names the active player.
    pub fn route(&self, tokens: &[&str], active_player: Option<&str>) -> Option<(Tier, Route)> {
        if tokens.len() < 2 {
            return None;
        }

        if let Some(route) = self.global.get(tokens[0]) {
            return Some((Tier::Global, *route));
        }
        if let Some(route) = self.prefixed.get(tokens[1]) {
            return Some((Tier::Prefixed, *route));
        }
        if let Some(route) = self.global_player.get(tokens[1]) {
            return Some((Tier::GlobalPlayerSpecific, *route));
        }

        let is_active = active_player.is_some_and(|id| decode(tokens[0]) == id);
        if is_active {
            if let Some(route) = self.player.get(tokens[1]) {
                return Some((Tier::PlayerSpecific, *route));
            }
            if let Some(route) = tokens.get(2).and_then(|key| self.prefixed_player.get(key)) {
                return Some((Tier::PrefixedPlayerSpecific, *route));
            }
        }

        trace!("No handler for line: {}", tokens.join(" "));
        None
    }
}
