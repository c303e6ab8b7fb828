//! Declarative registry of list-query commands and the paged-response parser.
//!
//! Adding a new list query is a one-line entry in [`QUERY_COMMANDS`]; the
//! router builds its dispatch tables from this list at startup.

use super::token::{decode_token, parse_decimal_int_or_zero, TokenMap};

/// Dispatch tier a line is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Keyed by token[0], independent of any player.
    Global,
    /// Keyed by token[1], scoped by the entity named in token[0].
    Prefixed,
    /// Keyed by token[1], for any known player.
    GlobalPlayerSpecific,
    /// Keyed by token[1], only for the active player.
    PlayerSpecific,
    /// Keyed by token[2], only for the active player.
    PrefixedPlayerSpecific,
}

/// How responses to a query command reach the item-list parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Registered directly in the router table for this tier.
    Table(Tier),
    /// Parsed by a hand-coded handler that owns the routing key
    /// (`status`, `playlists`).
    ViaHandler,
}

/// A list-query command understood by the item-list subsystem.
#[derive(Debug, PartialEq, Eq)]
pub struct QueryCommand {
    /// Command text as sent, minus any prefix (`albums`, `playlists tracks`, `items`).
    pub cmd: &'static str,
    pub routing: Routing,
    /// Key that opens each record in a response.
    pub item_delimiter: &'static str,
    /// Whether requests are addressed to a player.
    pub player_scoped: bool,
}

impl QueryCommand {
    const fn global(cmd: &'static str, item_delimiter: &'static str) -> Self {
        Self {
            cmd,
            routing: Routing::Table(Tier::Global),
            item_delimiter,
            player_scoped: false,
        }
    }

    /// Key this command is registered under in its router table.
    pub fn routing_key(&self) -> &'static str {
        match self.routing {
            Routing::Table(Tier::Prefixed) | Routing::Table(Tier::PrefixedPlayerSpecific) => {
                self.cmd.rsplit(' ').next().unwrap_or(self.cmd)
            }
            _ => self.cmd.split(' ').next().unwrap_or(self.cmd),
        }
    }
}

pub const QUERY_COMMANDS: &[QueryCommand] = &[
    QueryCommand::global("players", "playerindex"),
    QueryCommand::global("artists", "id"),
    QueryCommand::global("albums", "id"),
    QueryCommand::global("years", "year"),
    QueryCommand::global("genres", "id"),
    QueryCommand::global("songs", "id"),
    QueryCommand::global("musicfolder", "id"),
    QueryCommand::global("radios", "icon"),
    QueryCommand::global("apps", "icon"),
    QueryCommand {
        cmd: "playlists",
        routing: Routing::ViaHandler,
        item_delimiter: "id",
        player_scoped: false,
    },
    QueryCommand {
        cmd: "playlists tracks",
        routing: Routing::ViaHandler,
        item_delimiter: "playlist index",
        player_scoped: false,
    },
    QueryCommand {
        cmd: "status",
        routing: Routing::ViaHandler,
        item_delimiter: "playlist index",
        player_scoped: true,
    },
    // `<plugin> items`, e.g. `favorites items`
    QueryCommand {
        cmd: "items",
        routing: Routing::Table(Tier::Prefixed),
        item_delimiter: "id",
        player_scoped: false,
    },
    // `<player> <plugin> items`
    QueryCommand {
        cmd: "items",
        routing: Routing::Table(Tier::PrefixedPlayerSpecific),
        item_delimiter: "id",
        player_scoped: true,
    },
];

/// Find the query command for the command text of a request.
///
/// Exact matches win; otherwise a prefixed command (`favorites items`)
/// matches on its last word.
pub fn find_query(cmd: &str, player_scoped: bool) -> Option<&'static QueryCommand> {
    QUERY_COMMANDS
        .iter()
        .find(|q| q.cmd == cmd && q.player_scoped == player_scoped)
        .or_else(|| {
            let last = cmd.rsplit(' ').next()?;
            QUERY_COMMANDS.iter().find(|q| {
                q.player_scoped == player_scoped
                    && matches!(
                        q.routing,
                        Routing::Table(Tier::Prefixed) | Routing::Table(Tier::PrefixedPlayerSpecific)
                    )
                    && q.cmd == last
            })
        })
}

/// A decoded page of a list-query response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemListResponse {
    pub correlation_id: Option<u64>,
    /// Total number of items the server holds for the query.
    pub count: i32,
    /// Tokens preceding the first record (request echo, `count`, etc).
    pub parameters: TokenMap,
    pub items: Vec<TokenMap>,
}

/// Split a list-query response line into its records.
///
/// `tokens` is the whole raw line. Tokens without a value (command words,
/// paging numbers, the player id) are not part of any record.
pub fn parse_item_list(query: &QueryCommand, tokens: &[&str]) -> ItemListResponse {
    let mut response = ItemListResponse::default();
    let mut current: Option<TokenMap> = None;

    for raw in tokens {
        let Some((key, Some(value))) = decode_token(raw) else {
            continue;
        };

        if key == query.item_delimiter {
            if let Some(done) = current.take() {
                response.items.push(done);
            }
            current = Some(TokenMap::new());
        }

        match current.as_mut() {
            Some(record) => record.insert(key, Some(value)),
            None => response.parameters.insert(key, Some(value)),
        }
    }

    if let Some(done) = current {
        response.items.push(done);
    }

    response.count = response
        .parameters
        .get("count")
        .map(parse_decimal_int_or_zero)
        .unwrap_or(0);
    response.correlation_id = response
        .parameters
        .get("correlationid")
        .and_then(|s| s.parse().ok());
    response
}
