//! In-memory model of the server connection, its players and their state.

pub mod connection;
pub mod player;
pub mod player_state;
pub mod server_string;
pub mod song;

pub use connection::ConnectionState;
pub use player::{Player, PlayerId};
pub use player_state::{
    PlayStatus, PlayerState, RepeatStatus, ShuffleStatus, StatusDiff, SubscriptionLevel,
};
pub use server_string::ServerString;
pub use song::Song;
