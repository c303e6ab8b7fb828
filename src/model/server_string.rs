//! Localizable strings fetched from the server after the handshake.

/// Server string tokens, in fetch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerString {
    AllSongs,
    Albums,
    Artists,
    Genres,
    Years,
    NewMusic,
    MusicFolder,
    Playlists,
    Favorites,
    Apps,
    Radio,
    Search,
    ShuffleOff,
    ShuffleOnSongs,
    ShuffleOnAlbums,
    RepeatOff,
    RepeatOne,
    RepeatAll,
    Sleep,
    SleepCancel,
    Synchronize,
}

impl ServerString {
    pub const ALL: &'static [ServerString] = &[
        ServerString::AllSongs,
        ServerString::Albums,
        ServerString::Artists,
        ServerString::Genres,
        ServerString::Years,
        ServerString::NewMusic,
        ServerString::MusicFolder,
        ServerString::Playlists,
        ServerString::Favorites,
        ServerString::Apps,
        ServerString::Radio,
        ServerString::Search,
        ServerString::ShuffleOff,
        ServerString::ShuffleOnSongs,
        ServerString::ShuffleOnAlbums,
        ServerString::RepeatOff,
        ServerString::RepeatOne,
        ServerString::RepeatAll,
        ServerString::Sleep,
        ServerString::SleepCancel,
        ServerString::Synchronize,
    ];

    /// Token name the server knows the string by.
    pub fn token(&self) -> &'static str {
        match self {
            ServerString::AllSongs => "ALL_SONGS",
            ServerString::Albums => "ALBUMS",
            ServerString::Artists => "ARTISTS",
            ServerString::Genres => "GENRES",
            ServerString::Years => "YEARS",
            ServerString::NewMusic => "NEW_MUSIC",
            ServerString::MusicFolder => "BROWSE_MUSIC_FOLDER",
            ServerString::Playlists => "SAVED_PLAYLISTS",
            ServerString::Favorites => "FAVORITES",
            ServerString::Apps => "APPS",
            ServerString::Radio => "RADIO",
            ServerString::Search => "SEARCH",
            ServerString::ShuffleOff => "SHUFFLE_OFF",
            ServerString::ShuffleOnSongs => "SHUFFLE_ON_SONGS",
            ServerString::ShuffleOnAlbums => "SHUFFLE_ON_ALBUMS",
            ServerString::RepeatOff => "REPEAT_OFF",
            ServerString::RepeatOne => "REPEAT_ONE",
            ServerString::RepeatAll => "REPEAT_ALL",
            ServerString::Sleep => "SLEEP",
            ServerString::SleepCancel => "SLEEP_CANCEL",
            ServerString::Synchronize => "SYNCHRONIZE",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.token() == token)
    }

    /// Position in [`ServerString::ALL`].
    pub fn ordinal(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }
}
