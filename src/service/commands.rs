//! Operations callers issue against the server: playback, player settings,
//! playlists and library queries.
//!
//! Plain commands are queued and go out once the handshake completes. List
//! queries, capability getters and URL helpers fail fast with
//! [`ClientError::HandshakeNotComplete`] instead.

use std::fmt::Display;
use std::sync::Arc;

use super::{power_availability, Engine};
use crate::callbacks::{ClientId, ItemListCallback};
use crate::error::{ClientError, ClientResult};
use crate::model::{ConnectionState, PlayStatus, PlayerId};
use crate::protocol::token::encode;
use crate::protocol::{ALBUM_TAGS, SONG_TAGS};

/// Sort applied to album searches when the server has no preference.
const DEFAULT_ALBUM_SORT: &str = "album";

/// A `key:value` request parameter with the value escaped.
pub fn filter(key: &str, value: impl Display) -> String {
    format!("{}:{}", key, encode(&value.to_string()))
}

fn push_search(params: &mut Vec<String>, search: Option<&str>) {
    if let Some(search) = search.filter(|s| !s.is_empty()) {
        params.push(filter("search", search));
    }
}

impl Engine {
    // =========================================================================
    // Plumbing
    // =========================================================================

    fn active_player_command(&mut self, command: &str) -> ClientResult<()> {
        let player = self
            .require_connection()?
            .active_player_id()
            .ok_or(ClientError::NoActivePlayer)?;
        let line = format!("{} {}", player.encoded(), command);
        self.channel.send(line);
        Ok(())
    }

    fn player_command(&mut self, player: &PlayerId, command: &str) -> ClientResult<()> {
        if self.require_connection()?.player(player.as_str()).is_none() {
            return Err(ClientError::UnknownPlayer(player.to_string()));
        }
        self.channel
            .send(format!("{} {}", player.encoded(), command));
        Ok(())
    }

    fn server_command(&mut self, command: String) -> ClientResult<()> {
        self.require_connection()?;
        self.channel.send(command);
        Ok(())
    }

    fn fade_in(&self) -> String {
        match self.options.fade_in_secs {
            0 => String::new(),
            secs => format!(" {}", secs),
        }
    }

    fn active_play_status(&self) -> ClientResult<Option<PlayStatus>> {
        let player = self
            .require_connection()?
            .active_player()
            .ok_or(ClientError::NoActivePlayer)?;
        Ok(player.state.play_status)
    }

    // =========================================================================
    // Volume and power
    // =========================================================================

    pub fn adjust_volume_to(&mut self, volume: i32) -> ClientResult<()> {
        self.active_player_command(&format!("mixer volume {}", volume.clamp(0, 100)))
    }

    pub fn adjust_player_volume_to(&mut self, player: &PlayerId, volume: i32) -> ClientResult<()> {
        self.player_command(player, &format!("mixer volume {}", volume.clamp(0, 100)))
    }

    /// Relative change; the server reads an unescaped `+` as a space.
    /// A zero delta sends nothing: `mixer volume 0` would mute.
    pub fn adjust_volume_by(&mut self, delta: i32) -> ClientResult<()> {
        match delta {
            0 => Ok(()),
            d if d > 0 => self.active_player_command(&format!("mixer volume %2B{}", d)),
            d => self.active_player_command(&format!("mixer volume {}", d)),
        }
    }

    pub fn power_on(&mut self) -> ClientResult<()> {
        self.active_player_command("power 1")
    }

    pub fn power_off(&mut self) -> ClientResult<()> {
        self.active_player_command("power 0")
    }

    pub fn toggle_power(&mut self, player: &PlayerId) -> ClientResult<()> {
        self.player_command(player, "power")
    }

    pub fn can_power_on(&self) -> bool {
        power_availability(self.active_player()).0
    }

    pub fn can_power_off(&self) -> bool {
        power_availability(self.active_player()).1
    }

    // =========================================================================
    // Player settings
    // =========================================================================

    pub fn rename_player(&mut self, player: &PlayerId, name: &str) -> ClientResult<()> {
        self.player_command(player, &format!("name {}", encode(name)))
    }

    /// Put `player` to sleep after `secs` seconds; 0 cancels.
    pub fn sleep(&mut self, player: &PlayerId, secs: u32) -> ClientResult<()> {
        self.player_command(player, &format!("sleep {}", secs))
    }

    /// Make `slave` follow `master`.
    pub fn sync_player_to(&mut self, master: &PlayerId, slave: &PlayerId) -> ClientResult<()> {
        self.player_command(master, &format!("sync {}", slave.encoded()))
    }

    pub fn unsync_player(&mut self, player: &PlayerId) -> ClientResult<()> {
        self.player_command(player, "sync -")
    }

    // =========================================================================
    // Playback
    // =========================================================================

    /// Resume, start or pause the active player depending on its status.
    ///
    /// Always sends an explicit `pause 0|1` so the echo can be told apart
    /// from another client's toggle.
    pub fn toggle_pause_play(&mut self) -> ClientResult<()> {
        let command = match self.active_play_status()? {
            Some(PlayStatus::Play) => "pause 1".to_string(),
            Some(PlayStatus::Pause) => format!("pause 0{}", self.fade_in()),
            Some(PlayStatus::Stop) | None => format!("play{}", self.fade_in()),
        };
        self.active_player_command(&command)
    }

    pub fn play(&mut self) -> ClientResult<()> {
        let command = format!("play{}", self.fade_in());
        self.active_player_command(&command)
    }

    pub fn pause(&mut self) -> ClientResult<()> {
        let command = format!("pause 1{}", self.fade_in());
        self.active_player_command(&command)
    }

    pub fn stop(&mut self) -> ClientResult<()> {
        self.active_player_command("stop")
    }

    /// Skip forward. Returns false without sending if nothing is playing.
    pub fn next_track(&mut self) -> ClientResult<bool> {
        if self.active_play_status()? != Some(PlayStatus::Play) {
            return Ok(false);
        }
        self.active_player_command("button jump_fwd")?;
        Ok(true)
    }

    pub fn previous_track(&mut self) -> ClientResult<bool> {
        if self.active_play_status()? != Some(PlayStatus::Play) {
            return Ok(false);
        }
        self.active_player_command("button jump_rew")?;
        Ok(true)
    }

    pub fn toggle_shuffle(&mut self) -> ClientResult<()> {
        self.active_player_command("playlist shuffle")
    }

    pub fn toggle_repeat(&mut self) -> ClientResult<()> {
        self.active_player_command("playlist repeat")
    }

    pub fn set_seconds_elapsed(&mut self, secs: i32) -> ClientResult<()> {
        if secs < 0 {
            return Err(ClientError::InvalidArgument(format!(
                "negative song position: {}",
                secs
            )));
        }
        self.active_player_command(&format!("time {}", secs))
    }

    // =========================================================================
    // Current playlist
    // =========================================================================

    /// `cmd` is `load`, `add`, `insert` or `delete`; `item` a filter such as
    /// `album_id:12` built with [`filter`].
    pub fn playlist_control(&mut self, cmd: &str, item: &str) -> ClientResult<()> {
        self.active_player_command(&format!("playlistcontrol cmd:{} {}", cmd, item))
    }

    pub fn random_play(&mut self, mode: &str) -> ClientResult<()> {
        self.handshake.require_complete()?;
        self.active_player_command(&format!("randomplay {}", mode))
    }

    pub fn playlist_index(&mut self, index: i32) -> ClientResult<()> {
        let command = format!("playlist index {}{}", index, self.fade_in());
        self.active_player_command(&command)
    }

    pub fn playlist_remove(&mut self, index: i32) -> ClientResult<()> {
        self.active_player_command(&format!("playlist delete {}", index))
    }

    pub fn playlist_move(&mut self, from: i32, to: i32) -> ClientResult<()> {
        self.active_player_command(&format!("playlist move {} {}", from, to))
    }

    pub fn playlist_clear(&mut self) -> ClientResult<()> {
        self.active_player_command("playlist clear")
    }

    pub fn playlist_save(&mut self, name: &str) -> ClientResult<()> {
        self.active_player_command(&format!("playlist save {}", encode(name)))
    }

    /// Queue a plugin item, e.g. `favorites playlist play item_id:3`.
    pub fn plugin_playlist_control(
        &mut self,
        plugin: &str,
        cmd: &str,
        item_id: &str,
    ) -> ClientResult<()> {
        self.active_player_command(&format!("{} playlist {} item_id:{}", plugin, cmd, item_id))
    }

    // =========================================================================
    // Saved playlists
    // =========================================================================

    /// A name clash is reported through `on_create_failed`.
    pub fn playlists_new(&mut self, name: &str) -> ClientResult<()> {
        self.server_command(format!("playlists new name:{}", encode(name)))
    }

    pub fn playlists_delete(&mut self, playlist_id: &str) -> ClientResult<()> {
        self.server_command(format!("playlists delete {}", filter("playlist_id", playlist_id)))
    }

    pub fn playlists_move(&mut self, playlist_id: &str, index: i32, to: i32) -> ClientResult<()> {
        self.server_command(format!(
            "playlists edit cmd:move {} index:{} toindex:{}",
            filter("playlist_id", playlist_id),
            index,
            to
        ))
    }

    pub fn playlists_remove(&mut self, playlist_id: &str, index: i32) -> ClientResult<()> {
        self.server_command(format!(
            "playlists edit cmd:delete {} index:{}",
            filter("playlist_id", playlist_id),
            index
        ))
    }

    /// Starts with a dry run; the real rename follows if the name is free.
    pub fn playlists_rename(&mut self, playlist_id: &str, new_name: &str) -> ClientResult<()> {
        self.server_command(format!(
            "playlists rename {} dry_run:1 newname:{}",
            filter("playlist_id", playlist_id),
            encode(new_name)
        ))
    }

    pub fn set_preferred_album_sort(&mut self, sort: &str) -> ClientResult<()> {
        self.server_command(format!("pref jivealbumsort {}", encode(sort)))
    }

    // =========================================================================
    // Capabilities and URLs
    // =========================================================================

    fn handshaken(&self) -> ClientResult<&ConnectionState> {
        self.handshake.require_complete()?;
        self.require_connection()
    }

    pub fn can_favorites(&self) -> ClientResult<bool> {
        Ok(self.handshaken()?.can_favorites)
    }

    pub fn can_musicfolder(&self) -> ClientResult<bool> {
        Ok(self.handshaken()?.can_musicfolder)
    }

    pub fn can_myapps(&self) -> ClientResult<bool> {
        Ok(self.handshaken()?.can_myapps)
    }

    pub fn can_randomplay(&self) -> ClientResult<bool> {
        Ok(self.handshaken()?.can_randomplay)
    }

    pub fn preferred_album_sort(&self) -> ClientResult<String> {
        Ok(self
            .handshaken()?
            .preferred_album_sort
            .clone()
            .unwrap_or_else(|| DEFAULT_ALBUM_SORT.to_string()))
    }

    pub fn media_dirs(&self) -> ClientResult<Vec<String>> {
        Ok(self.handshaken()?.media_dirs.clone())
    }

    /// Absolute URL on the server's web port, or empty if the port is unknown.
    fn absolute_url(&self, path: &str) -> ClientResult<String> {
        let conn = self.handshaken()?;
        Ok(conn
            .http_base()
            .map(|base| format!("{}{}", base, path))
            .unwrap_or_default())
    }

    pub fn album_art_url(&self, artwork_track_id: &str) -> ClientResult<String> {
        self.absolute_url(&format!("/music/{}/cover.jpg", artwork_track_id))
    }

    pub fn song_download_url(&self, song_id: &str) -> ClientResult<String> {
        self.absolute_url(&format!("/music/{}/download", song_id))
    }

    pub fn icon_url(&self, icon: &str) -> ClientResult<String> {
        self.absolute_url(&format!("/{}", icon.trim_start_matches('/')))
    }

    // =========================================================================
    // Library queries
    // =========================================================================

    /// Relist the players; the usual players callbacks follow.
    pub fn refresh_players(&mut self) -> ClientResult<()> {
        self.handshake.require_complete()?;
        self.fetch_players();
        Ok(())
    }

    pub fn albums(
        &mut self,
        client: ClientId,
        start: i32,
        sort: &str,
        search: Option<&str>,
        filters: &[String],
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let mut params = vec![format!("tags:{}", ALBUM_TAGS), filter("sort", sort)];
        push_search(&mut params, search);
        params.extend(filters.iter().cloned());
        self.request_items(client, "albums", start, params, callback)
    }

    pub fn artists(
        &mut self,
        client: ClientId,
        start: i32,
        search: Option<&str>,
        filters: &[String],
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let mut params = Vec::new();
        push_search(&mut params, search);
        params.extend(filters.iter().cloned());
        self.request_items(client, "artists", start, params, callback)
    }

    pub fn years(
        &mut self,
        client: ClientId,
        start: i32,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.request_items(client, "years", start, Vec::new(), callback)
    }

    pub fn genres(
        &mut self,
        client: ClientId,
        start: i32,
        search: Option<&str>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let mut params = Vec::new();
        push_search(&mut params, search);
        self.request_items(client, "genres", start, params, callback)
    }

    /// Contents of a music folder; `None` lists the root.
    pub fn music_folders(
        &mut self,
        client: ClientId,
        start: i32,
        folder_id: Option<&str>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let mut params = vec!["tags:u".to_string()];
        if let Some(id) = folder_id {
            params.push(filter("folder_id", id));
        }
        self.request_items(client, "musicfolder", start, params, callback)
    }

    pub fn songs(
        &mut self,
        client: ClientId,
        start: i32,
        sort: &str,
        search: Option<&str>,
        filters: &[String],
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let mut params = vec![format!("tags:{}", SONG_TAGS), filter("sort", sort)];
        push_search(&mut params, search);
        params.extend(filters.iter().cloned());
        self.request_items(client, "songs", start, params, callback)
    }

    /// The active player's current playlist.
    pub fn current_playlist(
        &mut self,
        client: ClientId,
        start: i32,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let params = vec![format!("tags:{}", SONG_TAGS)];
        self.request_player_items(client, "status", start, params, callback)
    }

    pub fn playlist_songs(
        &mut self,
        client: ClientId,
        start: i32,
        playlist_id: &str,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let params = vec![
            filter("playlist_id", playlist_id),
            format!("tags:{}", SONG_TAGS),
        ];
        self.request_items(client, "playlists tracks", start, params, callback)
    }

    pub fn playlists(
        &mut self,
        client: ClientId,
        start: i32,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.request_items(client, "playlists", start, Vec::new(), callback)
    }

    /// Search artists, albums, genres and songs at once. Each list arrives
    /// as its own batches on `callback`.
    pub fn search(
        &mut self,
        client: ClientId,
        start: i32,
        term: &str,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let album_sort = self.preferred_album_sort()?;
        self.artists(client, start, Some(term), &[], Arc::clone(&callback))?;
        self.albums(client, start, &album_sort, Some(term), &[], Arc::clone(&callback))?;
        self.genres(client, start, Some(term), Arc::clone(&callback))?;
        self.songs(client, start, "title", Some(term), &[], callback)
    }

    pub fn radios(
        &mut self,
        client: ClientId,
        start: i32,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.request_items(client, "radios", start, Vec::new(), callback)
    }

    pub fn apps(
        &mut self,
        client: ClientId,
        start: i32,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.request_items(client, "apps", start, Vec::new(), callback)
    }

    /// Items of a plugin (`favorites`, `spotify`, ..) for the active player.
    /// `parent` is the item to expand; `None` lists the top level.
    pub fn plugin_items(
        &mut self,
        client: ClientId,
        start: i32,
        plugin: &str,
        parent: Option<&str>,
        search: Option<&str>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let mut params = Vec::new();
        if let Some(parent) = parent {
            params.push(filter("item_id", parent));
        }
        push_search(&mut params, search);
        self.request_player_items(client, &format!("{} items", plugin), start, params, callback)
    }
}
