//! Protocol engine: connection lifecycle, line dispatch, state reconciliation
//! and subscription scheduling.
//!
//! [`Engine`] is synchronous. It is owned by the serial worker in [`runtime`],
//! which feeds it transport events and lines one at a time and writes whatever
//! it leaves in the command channel to the wire. Nothing here blocks or awaits,
//! so every behaviour can be exercised line by line in unit tests.

pub mod channel;
mod commands;
mod handlers;
pub mod handshake;
pub mod items;
pub mod platform;
pub mod runtime;
pub mod subscription;

pub use runtime::{ClientBuilder, SqueezeClient};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::callbacks::{
    ClientId, HandshakeCallback, PlayerStateCallback, PlayersCallback, ServiceCallback,
    SharedCallbacks,
};
use crate::config::{Config, MemoryPreferences, PreferenceStore};
use crate::error::{ClientError, ClientResult};
use crate::model::{ConnectionState, PlayStatus, Player, PlayerId, StatusDiff};
use crate::protocol::{split_line, Route, Router};
use channel::CommandChannel;
use handshake::{login_command, Handshake, HandshakePhase};
use items::PendingRequests;
use platform::{LogNowPlaying, NoWakeLock, NowPlayingSurface, WakeLock};
use subscription::{required_level, status_command, subscription_command};

/// Tunables that shape outgoing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Fade-in appended to play and resume commands; 0 disables it.
    pub fade_in_secs: u32,
    /// Items requested per page of a list query.
    pub page_size: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            fade_in_secs: 0,
            page_size: 20,
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            fade_in_secs: config.fade_in_secs,
            page_size: config.page_size.max(1),
        }
    }
}

pub struct Engine {
    router: Router,
    handshake: Handshake,
    /// `None` while disconnected.
    connection: Option<ConnectionState>,
    channel: CommandChannel,
    callbacks: SharedCallbacks,
    pending: PendingRequests,
    preferences: Arc<dyn PreferenceStore>,
    wake_lock: Arc<dyn WakeLock>,
    now_playing: Arc<dyn NowPlayingSurface>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(callbacks: SharedCallbacks, options: EngineOptions) -> Self {
        Self {
            router: Router::new(),
            handshake: Handshake::new(),
            connection: None,
            channel: CommandChannel::new(),
            callbacks,
            pending: PendingRequests::new(),
            preferences: Arc::new(MemoryPreferences::new()),
            wake_lock: Arc::new(NoWakeLock),
            now_playing: Arc::new(LogNowPlaying),
            options,
        }
    }

    pub fn with_preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_wake_lock(mut self, wake_lock: Arc<dyn WakeLock>) -> Self {
        self.wake_lock = wake_lock;
        self
    }

    pub fn with_now_playing(mut self, now_playing: Arc<dyn NowPlayingSurface>) -> Self {
        self.now_playing = now_playing;
        self
    }

    /// Share the pending item-request table with a client handle.
    pub fn with_pending(mut self, pending: PendingRequests) -> Self {
        self.pending = pending;
        self
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Start a connection attempt. An existing connection is dropped first.
    pub fn connect(
        &mut self,
        host: &str,
        port: u16,
        username: Option<String>,
        password: Option<String>,
    ) {
        if self.connection.is_some() {
            self.disconnect(false);
        }
        info!("Connecting to {}:{}", host, port);
        self.connection = Some(ConnectionState::new(host, port, username, password));
        self.handshake.start_connecting();
    }

    /// The transport for the pending attempt is up: log in.
    pub fn transport_opened(&mut self) {
        if !self.handshake.is_connecting() {
            return;
        }
        let Some(conn) = &self.connection else {
            return;
        };
        info!("Connected to {}:{}", conn.host, conn.cli_port);
        let login = login_command(conn.username.as_deref(), conn.password.as_deref());

        self.handshake.transport_opened();
        self.channel.open();
        self.channel.send_immediately(login);
        self.notify_connection(true, true, false);
    }

    /// The transport for the pending attempt could not be opened.
    pub fn transport_failed(&mut self, reason: &str) {
        if !self.handshake.is_connecting() {
            return;
        }
        warn!("Connection attempt failed: {}", reason);
        self.handshake.reset();
        self.connection = None;
        self.channel.close();
        self.notify_connection(false, true, false);
    }

    /// Tear down the connection and every piece of per-connection state.
    ///
    /// `server_initiated` is true when the link dropped rather than being
    /// closed by the caller; before the handshake completes that means the
    /// server rejected the login.
    pub fn disconnect(&mut self, server_initiated: bool) {
        if self.connection.is_none() {
            return;
        }
        let login_failed = server_initiated && !self.handshake.is_complete();
        info!(
            "Disconnected{}",
            if login_failed { " (login failed)" } else { "" }
        );

        self.wake_lock.set_held(false);
        self.now_playing.clear();
        self.connection = None;
        self.handshake.reset();
        self.channel.close();
        self.pending.clear();
        self.notify_connection(false, false, login_failed);
    }

    // =========================================================================
    // Wire
    // =========================================================================

    /// Route and apply one line received from the server.
    pub fn handle_line(&mut self, line: &str) {
        debug!("RECV: {}", line);
        let tokens = split_line(line);
        let active = self
            .connection
            .as_ref()
            .and_then(|c| c.active_player_id())
            .map(PlayerId::as_str);

        match self.router.route(&tokens, active) {
            Some((_, Route::Handler(handler))) => self.dispatch(handler, &tokens),
            Some((_, Route::Query(query))) => self.handle_item_list(query, &tokens),
            None => {}
        }
    }

    /// Lines ready to be written, in wire order.
    pub fn take_outgoing(&mut self) -> Vec<String> {
        let lines = self.channel.take_ready(self.handshake.is_complete());
        for line in &lines {
            debug!("SEND: {}", line);
        }
        lines
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_connected(&self) -> bool {
        self.handshake.is_connected()
    }

    pub fn is_connect_in_progress(&self) -> bool {
        self.handshake.is_connecting()
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.handshake.is_complete()
    }

    pub fn handshake_phase(&self) -> HandshakePhase {
        self.handshake.phase()
    }

    pub fn connection(&self) -> Option<&ConnectionState> {
        self.connection.as_ref()
    }

    pub fn active_player(&self) -> Option<&Player> {
        self.connection.as_ref()?.active_player()
    }

    pub fn active_player_id(&self) -> Option<&PlayerId> {
        self.connection.as_ref()?.active_player_id()
    }

    /// Known players in listing order.
    pub fn players(&self) -> Vec<Player> {
        self.connection
            .as_ref()
            .map(|c| c.players().cloned().collect())
            .unwrap_or_default()
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.connection.as_ref()?.player(id)
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    fn require_connection(&self) -> ClientResult<&ConnectionState> {
        self.connection.as_ref().ok_or(ClientError::NotConnected)
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// The one place play status is written.
    pub(crate) fn update_play_status(&mut self, id: &PlayerId, status: PlayStatus) {
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        let is_active = conn.is_active(id);
        let Some(player) = conn.player_mut(id.as_str()) else {
            return;
        };
        if !player.state.set_play_status(status) || !is_active {
            return;
        }

        self.wake_lock.set_held(player.state.is_playing());
        self.now_playing.update(player);
        self.callbacks
            .service
            .for_each(|cb| cb.on_play_status_changed(status));
    }

    /// Notify observers of what a status line changed for `id`.
    pub(crate) fn deliver_status_diff(&self, id: &PlayerId, diff: &StatusDiff) {
        let Some(conn) = &self.connection else {
            return;
        };
        let Some(player) = conn.player(id.as_str()) else {
            return;
        };

        if diff.player_state_changed() {
            self.callbacks
                .player_state
                .for_each(|cb| cb.on_player_state_received(player));
        }

        if !conn.is_active(id) {
            return;
        }
        let state = &player.state;

        if diff.power {
            let (can_on, can_off) = power_availability(Some(player));
            self.callbacks
                .service
                .for_each(|cb| cb.on_power_status_changed(can_on, can_off));
        }
        if diff.song {
            self.now_playing.update(player);
            self.callbacks
                .music_changed
                .for_each(|cb| cb.on_music_changed(state));
        }
        if let (true, Some(shuffle)) = (diff.shuffle, state.shuffle) {
            self.callbacks
                .service
                .for_each(|cb| cb.on_shuffle_status_changed(diff.was_shuffle_unknown, shuffle.id()));
        }
        if let (true, Some(repeat)) = (diff.repeat, state.repeat) {
            self.callbacks
                .service
                .for_each(|cb| cb.on_repeat_status_changed(diff.was_repeat_unknown, repeat.id()));
        }
        if diff.position_changed() {
            self.callbacks.service.for_each(|cb| {
                cb.on_time_in_song_change(state.current_time_secs, state.current_song_duration)
            });
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Move `id` to the subscription level its observers need.
    ///
    /// The target is recorded before the server confirms it, so asking for
    /// the same level again sends nothing.
    pub(crate) fn update_player_subscription(&mut self, id: &PlayerId) {
        let player_state_subscribers = self.callbacks.player_state.count();
        let generic_subscribers = self.callbacks.service.count();
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        let is_active = conn.is_active(id);
        let Some(player) = conn.player_mut(id.as_str()) else {
            return;
        };

        let target = required_level(
            is_active,
            player.state.sleep,
            player_state_subscribers,
            generic_subscribers,
        );
        if !player.state.set_subscription(target) {
            return;
        }
        debug!("Subscription for {} -> {:?}", id, target);
        self.channel.send(subscription_command(id, target));
    }

    pub(crate) fn update_all_subscriptions(&mut self) {
        let ids = self
            .connection
            .as_ref()
            .map(ConnectionState::player_ids)
            .unwrap_or_default();
        for id in &ids {
            self.update_player_subscription(id);
        }
    }

    // =========================================================================
    // Active player
    // =========================================================================

    /// Make `player` the target of playback commands.
    ///
    /// Selecting the current player again does nothing.
    pub fn change_active_player(&mut self, player: Option<PlayerId>) -> ClientResult<()> {
        let conn = self.connection.as_mut().ok_or(ClientError::NotConnected)?;
        if conn.active_player_id() == player.as_ref() {
            return Ok(());
        }
        if !conn.set_active_player(player.clone()) {
            let id = player.map(|p| p.to_string()).unwrap_or_default();
            return Err(ClientError::UnknownPlayer(id));
        }
        info!(
            "Active player: {}",
            player.as_ref().map(PlayerId::as_str).unwrap_or("none")
        );

        if let Some(id) = &player {
            self.channel.send(status_command(id));
        }
        self.update_all_subscriptions();
        self.persist_last_player(player.as_ref());
        self.notify_players_changed();
        Ok(())
    }

    /// Remember the active player across restarts, off the serial path.
    fn persist_last_player(&self, player: Option<&PlayerId>) {
        let preferences = Arc::clone(&self.preferences);
        let player = player.map(|p| p.as_str().to_string());
        let write = move || {
            if let Err(e) = preferences.set_last_player(player.as_deref()) {
                warn!("Failed to save last player: {:#}", e);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }

    /// Pick the active player once a fresh listing is complete: the last one
    /// used if it is still around, else the first listed.
    pub(crate) fn select_initial_player(&mut self) {
        let Some(conn) = &self.connection else {
            return;
        };
        let choice = self
            .preferences
            .last_player()
            .filter(|id| conn.player(id).is_some())
            .map(PlayerId::from)
            .or_else(|| conn.first_player().cloned());

        match choice {
            Some(id) => {
                if let Err(e) = self.change_active_player(Some(id)) {
                    warn!("Could not select initial player: {}", e);
                }
            }
            None => self.notify_players_changed(),
        }
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    fn notify_connection(&self, is_connected: bool, post_connect: bool, login_failed: bool) {
        self.callbacks
            .connection
            .for_each(|cb| cb.on_connection_changed(is_connected, post_connect, login_failed));
    }

    pub(crate) fn notify_players_changed(&self) {
        let Some(conn) = &self.connection else {
            return;
        };
        let players: Vec<Player> = conn.players().cloned().collect();
        let active = conn.active_player();
        self.callbacks
            .players
            .for_each(|cb| cb.on_players_changed(&players, active));
    }

    pub(crate) fn notify_handshake_completed(&self) {
        self.callbacks
            .handshake
            .for_each(|cb| cb.on_handshake_completed());
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a handshake observer; it hears about a completed handshake
    /// straight away.
    pub fn register_handshake_callback(
        &mut self,
        client: ClientId,
        callback: Arc<dyn HandshakeCallback>,
    ) {
        if self.callbacks.handshake.register(client, Arc::clone(&callback))
            && self.handshake.is_complete()
        {
            callback.on_handshake_completed();
        }
    }

    /// Register a players observer; it receives the current list straight
    /// away if players are known.
    pub fn register_players_callback(&mut self, client: ClientId, callback: Arc<dyn PlayersCallback>) {
        if !self.callbacks.players.register(client, Arc::clone(&callback)) {
            return;
        }
        if let Some(conn) = self.connection.as_ref().filter(|c| c.has_players()) {
            let players: Vec<Player> = conn.players().cloned().collect();
            callback.on_players_changed(&players, conn.active_player());
        }
    }

    pub fn register_service_callback(&mut self, client: ClientId, callback: Arc<dyn ServiceCallback>) {
        self.callbacks.service.register(client, callback);
        self.update_all_subscriptions();
    }

    pub fn unregister_service_callback(&mut self, callback: &Arc<dyn ServiceCallback>) {
        self.callbacks.service.unregister(callback);
        self.update_all_subscriptions();
    }

    pub fn register_player_state_callback(
        &mut self,
        client: ClientId,
        callback: Arc<dyn PlayerStateCallback>,
    ) {
        self.callbacks.player_state.register(client, callback);
        self.update_all_subscriptions();
    }

    pub fn unregister_player_state_callback(&mut self, callback: &Arc<dyn PlayerStateCallback>) {
        self.callbacks.player_state.unregister(callback);
        self.update_all_subscriptions();
    }

    /// Drop every observer and pending item request owned by `client`.
    pub fn cancel_subscriptions(&mut self, client: ClientId) -> usize {
        let removed = self.callbacks.cancel_subscriptions(client);
        self.pending.cancel_client(client);
        self.update_all_subscriptions();
        removed
    }
}

/// Whether power on and power off are currently offered for `player`.
fn power_availability(player: Option<&Player>) -> (bool, bool) {
    match player {
        Some(p) if p.connected && p.can_power_off => (!p.state.powered_on, p.state.powered_on),
        _ => (false, false),
    }
}

#[cfg(test)]
pub(crate) mod tests;
