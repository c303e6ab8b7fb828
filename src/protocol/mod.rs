//! CLI wire protocol: token codec, query command registry and line router.

pub mod query;
pub mod router;
pub mod token;

pub use query::{find_query, parse_item_list, ItemListResponse, QueryCommand, Tier, QUERY_COMMANDS};
pub use router::{Handler, Route, Router};
pub use token::{decode, decode_token, decode_tokens, encode, encode_token, split_line, TokenMap};

/// Song tags requested with every player status.
pub const SONG_TAGS: &str = "aCdejJKlstxyu";

/// Album tags requested with album listings.
pub const ALBUM_TAGS: &str = "alyj";
