//! Mutable playback snapshot of one player.
//!
//! Every setter reports whether the stored value actually changed. A full
//! status line is applied with [`PlayerState::apply_status`], which collects
//! those results into a [`StatusDiff`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::song::Song;
use crate::protocol::token::{parse_decimal_int_or_zero, TokenMap};

/// Store `value` in `slot`, returning whether it differed.
fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

// =============================================================================
// Enumerations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayStatus {
    Play,
    Pause,
    Stop,
}

impl PlayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayStatus::Play => "play",
            PlayStatus::Pause => "pause",
            PlayStatus::Stop => "stop",
        }
    }
}

impl FromStr for PlayStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "play" => Ok(PlayStatus::Play),
            "pause" => Ok(PlayStatus::Pause),
            "stop" => Ok(PlayStatus::Stop),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PlayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShuffleStatus {
    Off,
    Song,
    Album,
}

impl ShuffleStatus {
    pub fn id(&self) -> i32 {
        match self {
            ShuffleStatus::Off => 0,
            ShuffleStatus::Song => 1,
            ShuffleStatus::Album => 2,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(ShuffleStatus::Off),
            1 => Some(ShuffleStatus::Song),
            2 => Some(ShuffleStatus::Album),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatStatus {
    Off,
    One,
    All,
}

impl RepeatStatus {
    pub fn id(&self) -> i32 {
        match self {
            RepeatStatus::Off => 0,
            RepeatStatus::One => 1,
            RepeatStatus::All => 2,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(RepeatStatus::Off),
            1 => Some(RepeatStatus::One),
            2 => Some(RepeatStatus::All),
            _ => None,
        }
    }
}

/// How eagerly the server pushes status lines for a player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SubscriptionLevel {
    #[default]
    None,
    OnChange,
    RealTime,
}

impl SubscriptionLevel {
    /// Wire token used in `subscribe:<token>`.
    pub fn token(&self) -> &'static str {
        match self {
            SubscriptionLevel::None => "-",
            SubscriptionLevel::OnChange => "0",
            SubscriptionLevel::RealTime => "1",
        }
    }

    /// Parse a `subscribe` value. Empty means none; anything unrecognised is `None`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.chars().next() {
            None | Some('-') => Some(SubscriptionLevel::None),
            Some('0') => Some(SubscriptionLevel::OnChange),
            Some('1') => Some(SubscriptionLevel::RealTime),
            Some(_) => None,
        }
    }
}

// =============================================================================
// PlayerState
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// `None` until the server first reports a mode.
    pub play_status: Option<PlayStatus>,
    pub powered_on: bool,
    pub shuffle: Option<ShuffleStatus>,
    pub repeat: Option<RepeatStatus>,
    pub current_song: Option<Song>,
    pub current_playlist: String,
    pub current_playlist_index: i32,
    pub current_time_secs: i32,
    pub current_song_duration: i32,
    pub volume: i32,
    /// Seconds left until the player sleeps.
    pub sleep: i32,
    pub sleep_duration: i32,
    pub sync_master: Option<String>,
    pub sync_slaves: Vec<String>,
    pub subscription: SubscriptionLevel,
}

impl PlayerState {
    pub fn is_playing(&self) -> bool {
        self.play_status == Some(PlayStatus::Play)
    }

    pub fn set_play_status(&mut self, status: PlayStatus) -> bool {
        replace(&mut self.play_status, Some(status))
    }

    pub fn set_powered_on(&mut self, on: bool) -> bool {
        replace(&mut self.powered_on, on)
    }

    pub fn set_shuffle(&mut self, status: ShuffleStatus) -> bool {
        replace(&mut self.shuffle, Some(status))
    }

    pub fn set_repeat(&mut self, status: RepeatStatus) -> bool {
        replace(&mut self.repeat, Some(status))
    }

    pub fn set_current_song(&mut self, song: Option<Song>) -> bool {
        replace(&mut self.current_song, song)
    }

    pub fn set_current_playlist(&mut self, name: Option<&str>) -> bool {
        replace(&mut self.current_playlist, name.unwrap_or_default().to_string())
    }

    pub fn set_current_playlist_index(&mut self, index: i32) -> bool {
        replace(&mut self.current_playlist_index, index)
    }

    pub fn set_current_time_secs(&mut self, secs: i32) -> bool {
        replace(&mut self.current_time_secs, secs)
    }

    pub fn set_current_song_duration(&mut self, secs: i32) -> bool {
        replace(&mut self.current_song_duration, secs)
    }

    pub fn set_volume(&mut self, volume: i32) -> bool {
        replace(&mut self.volume, volume)
    }

    pub fn set_sleep(&mut self, secs: i32) -> bool {
        replace(&mut self.sleep, secs)
    }

    pub fn set_sleep_duration(&mut self, secs: i32) -> bool {
        replace(&mut self.sleep_duration, secs)
    }

    pub fn set_sync_master(&mut self, master: Option<&str>) -> bool {
        replace(&mut self.sync_master, master.map(str::to_string))
    }

    pub fn set_sync_slaves(&mut self, slaves: Vec<String>) -> bool {
        replace(&mut self.sync_slaves, slaves)
    }

    pub fn set_subscription(&mut self, level: SubscriptionLevel) -> bool {
        replace(&mut self.subscription, level)
    }

    /// Apply the fields of a player `status` line.
    ///
    /// Play status is left to the caller (it goes through the play-status
    /// normalizer). Missing or unrecognised shuffle, repeat and subscribe
    /// values leave the stored value alone; missing numbers read as 0.
    pub fn apply_status(&mut self, map: &TokenMap) -> StatusDiff {
        let was_shuffle_unknown = self.shuffle.is_none();
        let was_repeat_unknown = self.repeat.is_none();

        let shuffle = map
            .get("playlist shuffle")
            .and_then(|s| ShuffleStatus::from_id(parse_decimal_int_or_zero(s)));
        let repeat = map
            .get("playlist repeat")
            .and_then(|s| RepeatStatus::from_id(parse_decimal_int_or_zero(s)));
        let subscription = map.get("subscribe").and_then(SubscriptionLevel::from_token);
        let slaves = map
            .get("sync_slaves")
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        StatusDiff {
            was_shuffle_unknown,
            was_repeat_unknown,
            power: self.set_powered_on(map.get_int_or_zero("power") == 1),
            shuffle: shuffle.is_some_and(|s| self.set_shuffle(s)),
            repeat: repeat.is_some_and(|r| self.set_repeat(r)),
            playlist_index: self.set_current_playlist_index(map.get_int_or_zero("playlist_cur_index")),
            playlist_name: self.set_current_playlist(map.get("playlist_name")),
            sleep: self.set_sleep(map.get_int_or_zero("will_sleep_in")),
            sleep_duration: self.set_sleep_duration(map.get_int_or_zero("sleep")),
            song: self.set_current_song(Song::from_tokens(map)),
            duration: self.set_current_song_duration(map.get_int_or_zero("duration")),
            time: self.set_current_time_secs(map.get_int_or_zero("time")),
            volume: self.set_volume(map.get_int_or_zero("mixer volume")),
            sync_master: self.set_sync_master(map.get("sync_master")),
            sync_slaves: self.set_sync_slaves(slaves),
            subscription: subscription.is_some_and(|l| self.set_subscription(l)),
        }
    }
}

/// Which fields a status line changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusDiff {
    /// Shuffle had never been observed before this line.
    pub was_shuffle_unknown: bool,
    pub was_repeat_unknown: bool,
    pub power: bool,
    pub shuffle: bool,
    pub repeat: bool,
    pub playlist_index: bool,
    pub playlist_name: bool,
    pub sleep: bool,
    pub sleep_duration: bool,
    pub song: bool,
    pub duration: bool,
    pub time: bool,
    pub volume: bool,
    pub sync_master: bool,
    pub sync_slaves: bool,
    pub subscription: bool,
}

impl StatusDiff {
    /// Changes reported to player-state observers. Song position is excluded.
    pub fn player_state_changed(&self) -> bool {
        self.power
            || self.sleep
            || self.sleep_duration
            || self.volume
            || self.song
            || self.sync_master
            || self.sync_slaves
    }

    pub fn position_changed(&self) -> bool {
        self.time || self.duration
    }
}
