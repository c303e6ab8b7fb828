//! Serial worker and the async client handle.
//!
//! One worker task owns the [`Engine`] and drains a bounded queue: transport
//! events, received lines and caller requests all pass through it in order.
//! Each link gets a generation number so events from a link that has since
//! been replaced or closed are ignored.

use std::io;
use std::sync::Arc;

use futures::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::items::{ItemBatch, PendingRequests};
use super::platform::{LogNowPlaying, NoWakeLock, NowPlayingSurface, WakeLock};
use super::{Engine, EngineOptions};
use crate::callbacks::{
    Callbacks, ClientId, ConnectionCallback, CurrentPlaylistCallback, HandshakeCallback,
    ItemListCallback, MusicChangedCallback, PlayerStateCallback, PlayersCallback,
    PlaylistMaintenanceCallback, ServiceCallback, SharedCallbacks, VolumeCallback,
};
use crate::config::{Config, MemoryPreferences, PreferenceStore, DEFAULT_CLI_PORT};
use crate::error::{ClientError, ClientResult};
use crate::model::{Player, PlayerId, PlayerState, ServerString};
use crate::transport::{Connection, TcpTransport, Transport};

const DEFAULT_QUEUE_CAPACITY: usize = 256;

type Job = Box<dyn FnOnce(&mut Engine) + Send>;

enum Work {
    Connect {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
    },
    Opened {
        generation: u64,
        connection: Connection,
    },
    OpenFailed {
        generation: u64,
        error: io::Error,
    },
    Line {
        generation: u64,
        line: String,
    },
    Closed {
        generation: u64,
    },
    Disconnect,
    Run(Job),
}

// =============================================================================
// Worker
// =============================================================================

struct Worker {
    engine: Engine,
    transport: Arc<dyn Transport>,
    /// Weak so that dropping every client handle stops the worker.
    tx: mpsc::WeakSender<Work>,
    generation: u64,
    writer: Option<Box<dyn AsyncWrite + Unpin + Send>>,
    /// Stops the reader task of the current link.
    link: Option<CancellationToken>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<Work>) {
        loop {
            let work = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Client worker received shutdown signal");
                    break;
                }
                work = rx.recv() => match work {
                    Some(work) => work,
                    None => break,
                },
            };
            self.handle(work);
            self.flush().await;
        }

        self.close_link();
        self.engine.disconnect(false);
        info!("Client worker stopped");
    }

    fn handle(&mut self, work: Work) {
        match work {
            Work::Connect {
                host,
                port,
                username,
                password,
            } => {
                self.drop_link();
                self.engine.connect(&host, port, username, password);
                self.spawn_connect(host, port);
            }
            Work::Opened {
                generation,
                connection,
            } => {
                if generation != self.generation {
                    debug!("Dropping stale link (generation {})", generation);
                    return;
                }
                self.writer = Some(connection.writer);
                self.spawn_reader(generation, connection.reader);
                self.engine.transport_opened();
            }
            Work::OpenFailed { generation, error } => {
                if generation == self.generation {
                    self.engine.transport_failed(&error.to_string());
                }
            }
            Work::Line { generation, line } => {
                if generation == self.generation {
                    self.engine.handle_line(&line);
                }
            }
            Work::Closed { generation } => {
                if generation == self.generation {
                    self.drop_link();
                    self.engine.disconnect(true);
                }
            }
            Work::Disconnect => {
                self.drop_link();
                self.engine.disconnect(false);
            }
            Work::Run(job) => job(&mut self.engine),
        }
    }

    fn close_link(&mut self) {
        if let Some(link) = self.link.take() {
            link.cancel();
        }
        self.writer = None;
    }

    /// Close the link and ignore anything still in flight from it.
    fn drop_link(&mut self) {
        self.close_link();
        self.generation += 1;
    }

    fn spawn_connect(&self, host: String, port: u16) {
        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        let transport = Arc::clone(&self.transport);
        let generation = self.generation;

        tokio::spawn(async move {
            let work = match transport.connect(&host, port).await {
                Ok(connection) => Work::Opened {
                    generation,
                    connection,
                },
                Err(error) => Work::OpenFailed { generation, error },
            };
            if tx.send(work).await.is_err() {
                debug!("Worker gone before connect to {}:{} finished", host, port);
            }
        });
    }

    fn spawn_reader(&mut self, generation: u64, mut reader: Box<dyn AsyncBufRead + Unpin + Send>) {
        let tx = self.tx.clone();
        let cancel = self.shutdown.child_token();
        self.link = Some(cancel.clone());

        tokio::spawn(async move {
            let mut line = String::new();
            loop {
                line.clear();

                tokio::select! {
                    _ = cancel.cancelled() => return,
                    result = reader.read_line(&mut line) => {
                        match result {
                            Ok(0) => {
                                info!("Server closed the connection");
                                break;
                            }
                            Ok(_) => {
                                let trimmed = line.trim_end_matches(['\r', '\n']);
                                if trimmed.is_empty() {
                                    continue;
                                }
                                let work = Work::Line {
                                    generation,
                                    line: trimmed.to_string(),
                                };
                                let Some(tx) = tx.upgrade() else {
                                    return;
                                };
                                if tx.send(work).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                warn!("CLI read error: {}", e);
                                break;
                            }
                        }
                    }
                }
            }

            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Work::Closed { generation }).await;
            }
        });
    }

    /// Write whatever the engine has ready. A failed write ends the link.
    async fn flush(&mut self) {
        let lines = self.engine.take_outgoing();
        if lines.is_empty() {
            return;
        }
        let Some(writer) = self.writer.as_mut() else {
            debug!("No link, dropping {} outgoing line(s)", lines.len());
            return;
        };

        if let Err(e) = write_lines(writer, &lines).await {
            warn!("CLI write error: {}", e);
            self.drop_link();
            self.engine.disconnect(true);
        }
    }
}

async fn write_lines(
    writer: &mut Box<dyn AsyncWrite + Unpin + Send>,
    lines: &[String],
) -> io::Result<()> {
    let mut payload = String::new();
    for line in lines {
        payload.push_str(line);
        payload.push('\n');
    }
    writer.write_all(payload.as_bytes()).await?;
    writer.flush().await
}

// =============================================================================
// Builder
// =============================================================================

pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    preferences: Arc<dyn PreferenceStore>,
    wake_lock: Arc<dyn WakeLock>,
    now_playing: Arc<dyn NowPlayingSurface>,
    options: EngineOptions,
    queue_capacity: usize,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            transport: Arc::new(TcpTransport),
            preferences: Arc::new(MemoryPreferences::new()),
            wake_lock: Arc::new(NoWakeLock),
            now_playing: Arc::new(LogNowPlaying),
            options: EngineOptions::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine options and queue size from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            options: EngineOptions::from(config),
            queue_capacity: config.queue_capacity.max(1),
            ..Self::default()
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn wake_lock(mut self, wake_lock: Arc<dyn WakeLock>) -> Self {
        self.wake_lock = wake_lock;
        self
    }

    pub fn now_playing(mut self, now_playing: Arc<dyn NowPlayingSurface>) -> Self {
        self.now_playing = now_playing;
        self
    }

    pub fn fade_in_secs(mut self, secs: u32) -> Self {
        self.options.fade_in_secs = secs;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.options.page_size = page_size.max(1);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Spawn the worker. Must be called from within a Tokio runtime.
    pub fn build(self) -> SqueezeClient {
        let callbacks: SharedCallbacks = Arc::new(Callbacks::new());
        let pending = PendingRequests::new();
        let shutdown = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let engine = Engine::new(Arc::clone(&callbacks), self.options)
            .with_preferences(self.preferences)
            .with_wake_lock(self.wake_lock)
            .with_now_playing(self.now_playing)
            .with_pending(pending.clone());

        let worker = Worker {
            engine,
            transport: self.transport,
            tx: tx.downgrade(),
            generation: 0,
            writer: None,
            link: None,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(worker.run(rx));

        SqueezeClient {
            tx,
            callbacks,
            pending,
            shutdown,
        }
    }
}

// =============================================================================
// Client handle
// =============================================================================

/// Forwards item batches into a channel.
struct BatchSender(mpsc::UnboundedSender<ItemBatch>);

impl ItemListCallback for BatchSender {
    fn on_items_received(&self, batch: ItemBatch) {
        if self.0.send(batch).is_err() {
            debug!("Item stream dropped before the last batch");
        }
    }
}

/// Cheap, cloneable handle to a running client.
///
/// Commands are queued behind everything already submitted; the returned
/// future resolves once the worker has accepted (not sent) them.
#[derive(Clone)]
pub struct SqueezeClient {
    tx: mpsc::Sender<Work>,
    callbacks: SharedCallbacks,
    pending: PendingRequests,
    shutdown: CancellationToken,
}

impl SqueezeClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn callbacks(&self) -> &SharedCallbacks {
        &self.callbacks
    }

    async fn submit(&self, work: Work) -> ClientResult<()> {
        self.tx.send(work).await.map_err(|_| ClientError::WorkerGone)
    }

    /// Run `f` against the engine on the worker and return its result.
    pub async fn run<T, F>(&self, f: F) -> ClientResult<T>
    where
        F: FnOnce(&mut Engine) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(Work::Run(Box::new(move |engine: &mut Engine| {
            // The caller may have stopped waiting.
            let _ = reply_tx.send(f(engine));
        })))
        .await?;
        reply_rx.await.map_err(|_| ClientError::WorkerGone)
    }

    async fn call<T, F>(&self, f: F) -> ClientResult<T>
    where
        F: FnOnce(&mut Engine) -> ClientResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run(f).await?
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start connecting. Progress is reported to connection callbacks.
    pub async fn connect(
        &self,
        host: impl Into<String>,
        port: u16,
        username: Option<String>,
        password: Option<String>,
    ) -> ClientResult<()> {
        self.submit(Work::Connect {
            host: host.into(),
            port,
            username,
            password,
        })
        .await
    }

    /// Connect to the server named in `config`.
    pub async fn connect_with(&self, config: &Config) -> ClientResult<()> {
        let host = config
            .host
            .clone()
            .ok_or_else(|| ClientError::InvalidArgument("no server host configured".to_string()))?;
        let port = if config.cli_port == 0 {
            DEFAULT_CLI_PORT
        } else {
            config.cli_port
        };
        self.connect(host, port, config.username.clone(), config.password.clone())
            .await
    }

    pub async fn disconnect(&self) -> ClientResult<()> {
        self.submit(Work::Disconnect).await
    }

    /// Stop the worker. Connection callbacks see a final disconnect.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub async fn is_connected(&self) -> bool {
        self.run(|e| e.is_connected()).await.unwrap_or(false)
    }

    pub async fn is_connect_in_progress(&self) -> bool {
        self.run(|e| e.is_connect_in_progress()).await.unwrap_or(false)
    }

    pub async fn is_handshake_complete(&self) -> bool {
        self.run(|e| e.is_handshake_complete()).await.unwrap_or(false)
    }

    pub async fn active_player(&self) -> ClientResult<Option<Player>> {
        self.run(|e| e.active_player().cloned()).await
    }

    pub async fn players(&self) -> ClientResult<Vec<Player>> {
        self.run(|e| e.players()).await
    }

    pub async fn player_state(&self, player: PlayerId) -> ClientResult<Option<PlayerState>> {
        self.run(move |e| e.player(player.as_str()).map(|p| p.state.clone()))
            .await
    }

    pub async fn active_player_state(&self) -> ClientResult<Option<PlayerState>> {
        self.run(|e| e.active_player().map(|p| p.state.clone())).await
    }

    pub async fn server_version(&self) -> ClientResult<Option<String>> {
        self.run(|e| e.connection().and_then(|c| c.server_version.clone()))
            .await
    }

    pub async fn server_string(&self, string: ServerString) -> ClientResult<Option<String>> {
        self.run(move |e| {
            e.connection()
                .and_then(|c| c.server_strings.get(&string).cloned())
        })
        .await
    }

    pub async fn can_favorites(&self) -> ClientResult<bool> {
        self.call(|e| e.can_favorites()).await
    }

    pub async fn can_musicfolder(&self) -> ClientResult<bool> {
        self.call(|e| e.can_musicfolder()).await
    }

    pub async fn can_myapps(&self) -> ClientResult<bool> {
        self.call(|e| e.can_myapps()).await
    }

    pub async fn can_randomplay(&self) -> ClientResult<bool> {
        self.call(|e| e.can_randomplay()).await
    }

    pub async fn can_power_on(&self) -> ClientResult<bool> {
        self.run(|e| e.can_power_on()).await
    }

    pub async fn can_power_off(&self) -> ClientResult<bool> {
        self.run(|e| e.can_power_off()).await
    }

    pub async fn preferred_album_sort(&self) -> ClientResult<String> {
        self.call(|e| e.preferred_album_sort()).await
    }

    pub async fn media_dirs(&self) -> ClientResult<Vec<String>> {
        self.call(|e| e.media_dirs()).await
    }

    pub async fn album_art_url(&self, artwork_track_id: impl Into<String>) -> ClientResult<String> {
        let id = artwork_track_id.into();
        self.call(move |e| e.album_art_url(&id)).await
    }

    pub async fn song_download_url(&self, song_id: impl Into<String>) -> ClientResult<String> {
        let id = song_id.into();
        self.call(move |e| e.song_download_url(&id)).await
    }

    pub async fn icon_url(&self, icon: impl Into<String>) -> ClientResult<String> {
        let icon = icon.into();
        self.call(move |e| e.icon_url(&icon)).await
    }

    // =========================================================================
    // Registration
    // =========================================================================

    pub fn register_connection_callback(
        &self,
        client: ClientId,
        callback: Arc<dyn ConnectionCallback>,
    ) -> bool {
        self.callbacks.connection.register(client, callback)
    }

    pub fn unregister_connection_callback(&self, callback: &Arc<dyn ConnectionCallback>) -> bool {
        self.callbacks.connection.unregister(callback)
    }

    /// The current player list is delivered straight away if known.
    pub async fn register_players_callback(
        &self,
        client: ClientId,
        callback: Arc<dyn PlayersCallback>,
    ) -> ClientResult<()> {
        self.run(move |e| e.register_players_callback(client, callback))
            .await
    }

    pub fn unregister_players_callback(&self, callback: &Arc<dyn PlayersCallback>) -> bool {
        self.callbacks.players.unregister(callback)
    }

    /// A completed handshake is reported straight away.
    pub async fn register_handshake_callback(
        &self,
        client: ClientId,
        callback: Arc<dyn HandshakeCallback>,
    ) -> ClientResult<()> {
        self.run(move |e| e.register_handshake_callback(client, callback))
            .await
    }

    pub fn unregister_handshake_callback(&self, callback: &Arc<dyn HandshakeCallback>) -> bool {
        self.callbacks.handshake.unregister(callback)
    }

    pub async fn register_service_callback(
        &self,
        client: ClientId,
        callback: Arc<dyn ServiceCallback>,
    ) -> ClientResult<()> {
        self.run(move |e| e.register_service_callback(client, callback))
            .await
    }

    pub async fn unregister_service_callback(
        &self,
        callback: Arc<dyn ServiceCallback>,
    ) -> ClientResult<()> {
        self.run(move |e| e.unregister_service_callback(&callback))
            .await
    }

    pub async fn register_player_state_callback(
        &self,
        client: ClientId,
        callback: Arc<dyn PlayerStateCallback>,
    ) -> ClientResult<()> {
        self.run(move |e| e.register_player_state_callback(client, callback))
            .await
    }

    pub async fn unregister_player_state_callback(
        &self,
        callback: Arc<dyn PlayerStateCallback>,
    ) -> ClientResult<()> {
        self.run(move |e| e.unregister_player_state_callback(&callback))
            .await
    }

    pub fn register_volume_callback(&self, client: ClientId, callback: Arc<dyn VolumeCallback>) -> bool {
        self.callbacks.volume.register(client, callback)
    }

    pub fn unregister_volume_callback(&self, callback: &Arc<dyn VolumeCallback>) -> bool {
        self.callbacks.volume.unregister(callback)
    }

    pub fn register_current_playlist_callback(
        &self,
        client: ClientId,
        callback: Arc<dyn CurrentPlaylistCallback>,
    ) -> bool {
        self.callbacks.current_playlist.register(client, callback)
    }

    pub fn unregister_current_playlist_callback(
        &self,
        callback: &Arc<dyn CurrentPlaylistCallback>,
    ) -> bool {
        self.callbacks.current_playlist.unregister(callback)
    }

    pub fn register_music_changed_callback(
        &self,
        client: ClientId,
        callback: Arc<dyn MusicChangedCallback>,
    ) -> bool {
        self.callbacks.music_changed.register(client, callback)
    }

    pub fn unregister_music_changed_callback(&self, callback: &Arc<dyn MusicChangedCallback>) -> bool {
        self.callbacks.music_changed.unregister(callback)
    }

    pub fn register_playlist_maintenance_callback(
        &self,
        client: ClientId,
        callback: Arc<dyn PlaylistMaintenanceCallback>,
    ) -> bool {
        self.callbacks.playlist_maintenance.register(client, callback)
    }

    pub fn unregister_playlist_maintenance_callback(
        &self,
        callback: &Arc<dyn PlaylistMaintenanceCallback>,
    ) -> bool {
        self.callbacks.playlist_maintenance.unregister(callback)
    }

    /// Drop every observer and item request owned by `client`.
    ///
    /// Observers are gone when this returns, even if a delivery is running.
    pub async fn cancel_subscriptions(&self, client: ClientId) -> ClientResult<usize> {
        let removed = self.callbacks.cancel_subscriptions(client);
        self.pending.cancel_client(client);
        self.run(|e| e.update_all_subscriptions()).await?;
        Ok(removed)
    }

    /// Forget `client`'s outstanding list requests; late pages are discarded.
    pub fn cancel_item_requests(&self, client: ClientId) -> usize {
        self.pending.cancel_client(client)
    }

    // =========================================================================
    // Players
    // =========================================================================

    pub async fn set_active_player(&self, player: Option<PlayerId>) -> ClientResult<()> {
        self.call(move |e| e.change_active_player(player)).await
    }

    pub async fn refresh_players(&self) -> ClientResult<()> {
        self.call(|e| e.refresh_players()).await
    }

    pub async fn adjust_volume_to(&self, volume: i32) -> ClientResult<()> {
        self.call(move |e| e.adjust_volume_to(volume)).await
    }

    pub async fn adjust_player_volume_to(&self, player: PlayerId, volume: i32) -> ClientResult<()> {
        self.call(move |e| e.adjust_player_volume_to(&player, volume))
            .await
    }

    pub async fn adjust_volume_by(&self, delta: i32) -> ClientResult<()> {
        self.call(move |e| e.adjust_volume_by(delta)).await
    }

    pub async fn power_on(&self) -> ClientResult<()> {
        self.call(|e| e.power_on()).await
    }

    pub async fn power_off(&self) -> ClientResult<()> {
        self.call(|e| e.power_off()).await
    }

    pub async fn toggle_power(&self, player: PlayerId) -> ClientResult<()> {
        self.call(move |e| e.toggle_power(&player)).await
    }

    pub async fn rename_player(&self, player: PlayerId, name: impl Into<String>) -> ClientResult<()> {
        let name = name.into();
        self.call(move |e| e.rename_player(&player, &name)).await
    }

    pub async fn sleep(&self, player: PlayerId, secs: u32) -> ClientResult<()> {
        self.call(move |e| e.sleep(&player, secs)).await
    }

    pub async fn sync_player_to(&self, master: PlayerId, slave: PlayerId) -> ClientResult<()> {
        self.call(move |e| e.sync_player_to(&master, &slave)).await
    }

    pub async fn unsync_player(&self, player: PlayerId) -> ClientResult<()> {
        self.call(move |e| e.unsync_player(&player)).await
    }

    // =========================================================================
    // Playback
    // =========================================================================

    pub async fn toggle_pause_play(&self) -> ClientResult<()> {
        self.call(|e| e.toggle_pause_play()).await
    }

    pub async fn play(&self) -> ClientResult<()> {
        self.call(|e| e.play()).await
    }

    pub async fn pause(&self) -> ClientResult<()> {
        self.call(|e| e.pause()).await
    }

    pub async fn stop(&self) -> ClientResult<()> {
        self.call(|e| e.stop()).await
    }

    pub async fn next_track(&self) -> ClientResult<bool> {
        self.call(|e| e.next_track()).await
    }

    pub async fn previous_track(&self) -> ClientResult<bool> {
        self.call(|e| e.previous_track()).await
    }

    pub async fn toggle_shuffle(&self) -> ClientResult<()> {
        self.call(|e| e.toggle_shuffle()).await
    }

    pub async fn toggle_repeat(&self) -> ClientResult<()> {
        self.call(|e| e.toggle_repeat()).await
    }

    pub async fn set_seconds_elapsed(&self, secs: i32) -> ClientResult<()> {
        self.call(move |e| e.set_seconds_elapsed(secs)).await
    }

    // =========================================================================
    // Playlists
    // =========================================================================

    pub async fn playlist_control(&self, cmd: impl Into<String>, item: impl Into<String>) -> ClientResult<()> {
        let (cmd, item) = (cmd.into(), item.into());
        self.call(move |e| e.playlist_control(&cmd, &item)).await
    }

    pub async fn random_play(&self, mode: impl Into<String>) -> ClientResult<()> {
        let mode = mode.into();
        self.call(move |e| e.random_play(&mode)).await
    }

    pub async fn playlist_index(&self, index: i32) -> ClientResult<()> {
        self.call(move |e| e.playlist_index(index)).await
    }

    pub async fn playlist_remove(&self, index: i32) -> ClientResult<()> {
        self.call(move |e| e.playlist_remove(index)).await
    }

    pub async fn playlist_move(&self, from: i32, to: i32) -> ClientResult<()> {
        self.call(move |e| e.playlist_move(from, to)).await
    }

    pub async fn playlist_clear(&self) -> ClientResult<()> {
        self.call(|e| e.playlist_clear()).await
    }

    pub async fn playlist_save(&self, name: impl Into<String>) -> ClientResult<()> {
        let name = name.into();
        self.call(move |e| e.playlist_save(&name)).await
    }

    pub async fn plugin_playlist_control(
        &self,
        plugin: impl Into<String>,
        cmd: impl Into<String>,
        item_id: impl Into<String>,
    ) -> ClientResult<()> {
        let (plugin, cmd, item_id) = (plugin.into(), cmd.into(), item_id.into());
        self.call(move |e| e.plugin_playlist_control(&plugin, &cmd, &item_id))
            .await
    }

    pub async fn playlists_new(&self, name: impl Into<String>) -> ClientResult<()> {
        let name = name.into();
        self.call(move |e| e.playlists_new(&name)).await
    }

    pub async fn playlists_delete(&self, playlist_id: impl Into<String>) -> ClientResult<()> {
        let id = playlist_id.into();
        self.call(move |e| e.playlists_delete(&id)).await
    }

    pub async fn playlists_move(
        &self,
        playlist_id: impl Into<String>,
        index: i32,
        to: i32,
    ) -> ClientResult<()> {
        let id = playlist_id.into();
        self.call(move |e| e.playlists_move(&id, index, to)).await
    }

    pub async fn playlists_remove(&self, playlist_id: impl Into<String>, index: i32) -> ClientResult<()> {
        let id = playlist_id.into();
        self.call(move |e| e.playlists_remove(&id, index)).await
    }

    pub async fn playlists_rename(
        &self,
        playlist_id: impl Into<String>,
        new_name: impl Into<String>,
    ) -> ClientResult<()> {
        let (id, name) = (playlist_id.into(), new_name.into());
        self.call(move |e| e.playlists_rename(&id, &name)).await
    }

    pub async fn set_preferred_album_sort(&self, sort: impl Into<String>) -> ClientResult<()> {
        let sort = sort.into();
        self.call(move |e| e.set_preferred_album_sort(&sort)).await
    }

    // =========================================================================
    // Library
    // =========================================================================

    /// Request a list; pages arrive on `callback`. `start < 0` fetches all.
    pub async fn request_items(
        &self,
        client: ClientId,
        command: impl Into<String>,
        start: i32,
        params: Vec<String>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let command = command.into();
        self.call(move |e| e.request_items(client, &command, start, params, callback))
            .await
    }

    /// Request a list addressed to the active player.
    pub async fn request_player_items(
        &self,
        client: ClientId,
        command: impl Into<String>,
        start: i32,
        params: Vec<String>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let command = command.into();
        self.call(move |e| e.request_player_items(client, &command, start, params, callback))
            .await
    }

    /// Fetch every page of a list as a stream of batches.
    ///
    /// The stream ends after the last page, or early if the connection
    /// drops.
    pub async fn item_stream(
        &self,
        command: impl Into<String>,
        params: Vec<String>,
    ) -> ClientResult<impl Stream<Item = ItemBatch>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: Arc<dyn ItemListCallback> = Arc::new(BatchSender(tx));
        self.request_items(ClientId::next(), command, -1, params, callback)
            .await?;

        Ok(futures::stream::unfold((rx, false), |(mut rx, done)| async move {
            if done {
                return None;
            }
            let batch = rx.recv().await?;
            let last = batch.is_last();
            Some((batch, (rx, last)))
        }))
    }

    pub async fn albums(
        &self,
        client: ClientId,
        start: i32,
        sort: impl Into<String>,
        search: Option<String>,
        filters: Vec<String>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let sort = sort.into();
        self.call(move |e| {
            e.albums(client, start, &sort, search.as_deref(), &filters, callback)
        })
        .await
    }

    pub async fn artists(
        &self,
        client: ClientId,
        start: i32,
        search: Option<String>,
        filters: Vec<String>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.call(move |e| e.artists(client, start, search.as_deref(), &filters, callback))
            .await
    }

    pub async fn years(
        &self,
        client: ClientId,
        start: i32,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.call(move |e| e.years(client, start, callback)).await
    }

    pub async fn genres(
        &self,
        client: ClientId,
        start: i32,
        search: Option<String>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.call(move |e| e.genres(client, start, search.as_deref(), callback))
            .await
    }

    pub async fn music_folders(
        &self,
        client: ClientId,
        start: i32,
        folder_id: Option<String>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.call(move |e| e.music_folders(client, start, folder_id.as_deref(), callback))
            .await
    }

    pub async fn songs(
        &self,
        client: ClientId,
        start: i32,
        sort: impl Into<String>,
        search: Option<String>,
        filters: Vec<String>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let sort = sort.into();
        self.call(move |e| e.songs(client, start, &sort, search.as_deref(), &filters, callback))
            .await
    }

    pub async fn current_playlist(
        &self,
        client: ClientId,
        start: i32,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.call(move |e| e.current_playlist(client, start, callback))
            .await
    }

    pub async fn playlist_songs(
        &self,
        client: ClientId,
        start: i32,
        playlist_id: impl Into<String>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let id = playlist_id.into();
        self.call(move |e| e.playlist_songs(client, start, &id, callback))
            .await
    }

    pub async fn playlists(
        &self,
        client: ClientId,
        start: i32,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.call(move |e| e.playlists(client, start, callback)).await
    }

    pub async fn search(
        &self,
        client: ClientId,
        start: i32,
        term: impl Into<String>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let term = term.into();
        self.call(move |e| e.search(client, start, &term, callback))
            .await
    }

    pub async fn radios(
        &self,
        client: ClientId,
        start: i32,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.call(move |e| e.radios(client, start, callback)).await
    }

    pub async fn apps(
        &self,
        client: ClientId,
        start: i32,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.call(move |e| e.apps(client, start, callback)).await
    }

    pub async fn plugin_items(
        &self,
        client: ClientId,
        start: i32,
        plugin: impl Into<String>,
        parent: Option<String>,
        search: Option<String>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        let plugin = plugin.into();
        self.call(move |e| {
            e.plugin_items(
                client,
                start,
                &plugin,
                parent.as_deref(),
                search.as_deref(),
                callback,
            )
        })
        .await
    }
}
