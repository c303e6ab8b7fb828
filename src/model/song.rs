//! Song metadata as reported in player status and track listings.

use serde::{Deserialize, Serialize};

use crate::protocol::token::{parse_decimal_int_or_zero, TokenMap};

/// One track, built from the song tags of a status or listing record.
///
/// Equality is by value, so re-reading an unchanged status yields an equal
/// song.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_id: String,
    pub artist_id: String,
    pub year: i32,
    pub track_num: i32,
    /// Seconds.
    pub duration: i32,
    pub artwork_track_id: Option<String>,
    /// Artwork for remote streams; may be relative to the server.
    pub artwork_url: Option<String>,
    pub url: String,
    pub remote: bool,
    pub compilation: bool,
}

impl Song {
    /// Build a song from decoded tokens.
    ///
    /// Returns `None` when the record names no track (neither `id` nor
    /// `title`), e.g. the status of a player with an empty playlist.
    pub fn from_tokens(map: &TokenMap) -> Option<Self> {
        let id = map.get("id");
        let title = map.get("title");
        if id.is_none() && title.is_none() {
            return None;
        }

        let text = |key: &str| map.get(key).unwrap_or_default().to_string();
        let flag = |key: &str| map.get(key).map(parse_decimal_int_or_zero) == Some(1);

        Some(Self {
            id: id.unwrap_or_default().to_string(),
            title: title.unwrap_or_default().to_string(),
            artist: text("artist"),
            album: text("album"),
            album_id: text("album_id"),
            artist_id: text("artist_id"),
            year: map.get_int_or_zero("year"),
            track_num: map.get("tracknum").map(parse_decimal_int_or_zero).unwrap_or(1),
            duration: map.get_int_or_zero("duration"),
            artwork_track_id: map
                .get("artwork_track_id")
                .or_else(|| map.get("coverid"))
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            artwork_url: map
                .get("artwork_url")
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            url: text("url"),
            remote: flag("remote"),
            compilation: flag("compilation"),
        })
    }

    /// Display name; remote streams often carry only a URL.
    pub fn name(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}
