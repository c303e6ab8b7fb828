//! Line handlers for command echoes and server notifications.

use tracing::{debug, info};

use super::handshake::CAPABILITY_QUERIES;
use super::subscription::status_command;
use super::Engine;
use crate::model::{PlayStatus, PlayerId, ServerString};
use crate::protocol::query::find_query;
use crate::protocol::token::{decode, decode_tokens, encode, parse_decimal_int_or_zero};
use crate::protocol::Handler;

/// Server strings requested per `getstring` command.
const STRINGS_PER_REQUEST: usize = 8;

impl Engine {
    pub(super) fn dispatch(&mut self, handler: Handler, tokens: &[&str]) {
        match handler {
            Handler::Login => self.on_login(),
            Handler::Version => self.on_version(tokens),
            Handler::GetString => self.on_getstring(tokens),
            Handler::Pref => self.on_pref(tokens),
            Handler::Can => self.on_can(tokens),
            Handler::Playlists => self.on_playlists(tokens),
            Handler::Client => self.on_client(),
            Handler::Status => self.on_status(tokens),
            Handler::Prefset => self.on_prefset(tokens),
            Handler::Play => self.on_active_play_status(PlayStatus::Play),
            Handler::Stop => self.on_active_play_status(PlayStatus::Stop),
            Handler::Pause => self.on_pause(tokens.get(2).copied()),
            Handler::Playlist => self.on_playlist(tokens),
        }
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    fn on_login(&mut self) {
        if !self.handshake.login_acknowledged() {
            return;
        }
        info!("Login accepted");
        self.fetch_players();
        for query in CAPABILITY_QUERIES {
            self.channel.send_immediately(*query);
        }
    }

    fn on_version(&mut self, tokens: &[&str]) {
        let version = tokens.get(1).map(|raw| decode(raw));
        if let Some(conn) = self.connection.as_mut() {
            conn.server_version = version.clone();
        }
        if !self.handshake.version_received() {
            return;
        }
        info!(
            "Handshake complete, server version {}",
            version.as_deref().unwrap_or("?")
        );
        self.fetch_strings(0);
        self.notify_handshake_completed();
    }

    /// Request the localized server strings from index `from` onwards. Only
    /// sent once the handshake is complete.
    fn fetch_strings(&mut self, from: usize) {
        if !self.handshake.is_complete() {
            return;
        }
        let names: Vec<&str> = ServerString::ALL
            .iter()
            .skip(from)
            .take(STRINGS_PER_REQUEST)
            .map(ServerString::token)
            .collect();
        if !names.is_empty() {
            self.channel
                .send_immediately(format!("getstring {}", names.join(",")));
        }
    }

    fn on_getstring(&mut self, tokens: &[&str]) {
        let Some(conn) = self.connection.as_mut() else {
            return;
        };

        let mut last_ordinal = None;
        for (key, value) in decode_tokens(tokens.iter().copied()).iter() {
            let (Some(string), Some(value)) = (ServerString::from_token(key), value) else {
                continue;
            };
            conn.server_strings.insert(string, value.to_string());
            last_ordinal = last_ordinal.max(Some(string.ordinal()));
        }

        // Nothing recognised means the server cannot help with the rest.
        if let Some(last) = last_ordinal {
            if last + 1 < ServerString::ALL.len() {
                self.fetch_strings(last + 1);
            }
        }
    }

    fn on_pref(&mut self, tokens: &[&str]) {
        let (Some(conn), Some(value)) = (self.connection.as_mut(), tokens.get(2)) else {
            return;
        };
        match tokens[1] {
            "httpport" => {
                if let Ok(port) = decode(value).trim().parse::<u16>() {
                    conn.http_port = Some(port);
                }
            }
            "jivealbumsort" => conn.preferred_album_sort = Some(decode(value)),
            "mediadirs" => {
                conn.media_dirs = decode(value)
                    .split(',')
                    .filter(|dir| !dir.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }

    fn on_can(&mut self, tokens: &[&str]) {
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        let flag = |index: usize| {
            tokens
                .get(index)
                .map(|raw| parse_decimal_int_or_zero(raw) == 1)
        };
        // `can favorites items ?` answers in token 3
        match tokens[1] {
            "favorites" => conn.can_favorites = flag(3).unwrap_or(conn.can_favorites),
            "myapps" => conn.can_myapps = flag(3).unwrap_or(conn.can_myapps),
            "musicfolder" => conn.can_musicfolder = flag(2).unwrap_or(conn.can_musicfolder),
            "randomplay" => conn.can_randomplay = flag(2).unwrap_or(conn.can_randomplay),
            _ => {}
        }
    }

    // =========================================================================
    // Saved playlists
    // =========================================================================

    fn on_playlists(&mut self, tokens: &[&str]) {
        match tokens[1] {
            "delete" | "edit" => {}
            "new" => {
                let map = decode_tokens(tokens.iter().copied());
                if map.contains_key("overwritten_playlist_id") {
                    let name = map.get("name").unwrap_or_default();
                    self.callbacks
                        .playlist_maintenance
                        .for_each(|cb| cb.on_create_failed(name));
                }
            }
            "rename" => {
                let map = decode_tokens(tokens.iter().copied());
                if !map.contains_key("dry_run") {
                    return;
                }
                let new_name = map.get("newname").unwrap_or_default();
                if map.contains_key("overwritten_playlist_id") {
                    self.callbacks
                        .playlist_maintenance
                        .for_each(|cb| cb.on_rename_failed(new_name));
                } else {
                    let line = format!(
                        "playlists rename playlist_id:{} newname:{}",
                        map.get("playlist_id").unwrap_or_default(),
                        encode(new_name)
                    );
                    self.channel.send_immediately(line);
                }
            }
            "tracks" => {
                if let Some(query) = find_query("playlists tracks", false) {
                    self.handle_item_list(query, tokens);
                }
            }
            _ => {
                if let Some(query) = find_query("playlists", false) {
                    self.handle_item_list(query, tokens);
                }
            }
        }
    }

    // =========================================================================
    // Player notifications
    // =========================================================================

    /// A player connected, disconnected or was forgotten: relist them all.
    fn on_client(&mut self) {
        self.fetch_players();
    }

    fn on_status(&mut self, tokens: &[&str]) {
        if tokens.get(2) != Some(&"-") {
            if let Some(query) = find_query("status", true) {
                self.handle_item_list(query, tokens);
            }
            return;
        }

        let id = PlayerId::new(decode(tokens[0]));
        let map = decode_tokens(tokens.iter().copied());
        let Some(player) = self
            .connection
            .as_mut()
            .and_then(|c| c.player_mut(id.as_str()))
        else {
            debug!("Status for unknown player {}", id);
            return;
        };
        let diff = player.state.apply_status(&map);

        if let Some(mode) = map.get("mode").and_then(|m| m.parse::<PlayStatus>().ok()) {
            self.update_play_status(&id, mode);
        }
        self.update_player_subscription(&id);
        self.deliver_status_diff(&id, &diff);
    }

    /// `<player> prefset server volume <n>`
    fn on_prefset(&mut self, tokens: &[&str]) {
        if tokens.len() < 5 || tokens[2] != "server" || tokens[3] != "volume" {
            return;
        }
        let id = PlayerId::new(decode(tokens[0]));
        let volume = parse_decimal_int_or_zero(tokens[4]);
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        let is_active = conn.is_active(&id);
        let Some(player) = conn.player_mut(id.as_str()) else {
            return;
        };
        player.state.set_volume(volume);

        let player = &*player;
        self.callbacks.volume.for_each(|cb| {
            if cb.want_all_players() || is_active {
                cb.on_volume_changed(volume, player);
            }
        });
    }

    fn on_active_play_status(&mut self, status: PlayStatus) {
        if let Some(id) = self.active_player_id().cloned() {
            self.update_play_status(&id, status);
        }
    }

    /// `pause 0` resumes and `pause 1` pauses. A bare `pause` toggles and
    /// leaves the status to the next status line.
    fn on_pause(&mut self, explicit: Option<&str>) {
        match explicit {
            Some("0") => self.on_active_play_status(PlayStatus::Play),
            Some("1") => self.on_active_play_status(PlayStatus::Pause),
            _ => {}
        }
        self.update_all_subscriptions();
    }

    /// `<player> playlist <notification> ..` for the active player.
    fn on_playlist(&mut self, tokens: &[&str]) {
        let Some(notification) = tokens.get(2) else {
            return;
        };
        match *notification {
            "newsong" => {
                if let Some(id) = self.active_player_id() {
                    let line = status_command(id);
                    self.channel.send(line);
                }
            }
            "play" => self.on_active_play_status(PlayStatus::Play),
            "stop" => self.on_active_play_status(PlayStatus::Stop),
            "pause" => self.on_pause(tokens.get(3).copied()),
            "addtracks" => {
                if let Some(player) = self.active_player() {
                    let state = &player.state;
                    self.callbacks
                        .current_playlist
                        .for_each(|cb| cb.on_add_tracks(state));
                }
            }
            "delete" => {
                let index = tokens.get(3).map_or(0, |raw| parse_decimal_int_or_zero(raw));
                if let Some(player) = self.active_player() {
                    let state = &player.state;
                    self.callbacks
                        .current_playlist
                        .for_each(|cb| cb.on_delete(state, index));
                }
            }
            _ => {}
        }
    }
}
