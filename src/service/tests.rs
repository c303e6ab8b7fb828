//! Engine behaviour driven line by line, the way the worker drives it.

use std::sync::{Arc, Mutex, PoisonError};

use super::handshake::{HandshakePhase, CAPABILITY_QUERIES};
use super::items::ItemBatch;
use super::platform::WakeLock;
use super::subscription::status_command;
use super::{Engine, EngineOptions};
use crate::callbacks::{
    Callbacks, ClientId, ConnectionCallback, CurrentPlaylistCallback, HandshakeCallback,
    ItemListCallback, MusicChangedCallback, PlayerStateCallback, PlayersCallback,
    PlaylistMaintenanceCallback, ServiceCallback, VolumeCallback,
};
use crate::config::{MemoryPreferences, PreferenceStore};
use crate::error::ClientError;
use crate::model::{PlayStatus, Player, PlayerId, PlayerState, ServerString, SubscriptionLevel};

const KITCHEN: &str = "a5b3c1";
const DEN: &str = "b7c8d9";

/// Records every notification it receives as a short line of text.
#[derive(Default)]
pub(crate) struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn record(&self, event: String) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ConnectionCallback for Recorder {
    fn on_connection_changed(&self, is_connected: bool, post_connect: bool, login_failed: bool) {
        self.record(format!(
            "connection {} {} {}",
            is_connected, post_connect, login_failed
        ));
    }
}

impl PlayersCallback for Recorder {
    fn on_players_changed(&self, players: &[Player], active: Option<&Player>) {
        self.record(format!(
            "players {} {}",
            players.len(),
            active.map(|p| p.id.as_str()).unwrap_or("-")
        ));
    }
}

impl HandshakeCallback for Recorder {
    fn on_handshake_completed(&self) {
        self.record("handshake".to_string());
    }
}

impl ServiceCallback for Recorder {
    fn on_play_status_changed(&self, status: PlayStatus) {
        self.record(format!("play_status {}", status));
    }

    fn on_shuffle_status_changed(&self, was_unknown: bool, shuffle_id: i32) {
        self.record(format!("shuffle {} {}", was_unknown, shuffle_id));
    }

    fn on_repeat_status_changed(&self, was_unknown: bool, repeat_id: i32) {
        self.record(format!("repeat {} {}", was_unknown, repeat_id));
    }

    fn on_time_in_song_change(&self, elapsed_secs: i32, duration_secs: i32) {
        self.record(format!("time {} {}", elapsed_secs, duration_secs));
    }

    fn on_power_status_changed(&self, can_power_on: bool, can_power_off: bool) {
        self.record(format!("power {} {}", can_power_on, can_power_off));
    }
}

impl PlayerStateCallback for Recorder {
    fn on_player_state_received(&self, player: &Player) {
        self.record(format!("player_state {}", player.id));
    }
}

impl VolumeCallback for Recorder {
    fn on_volume_changed(&self, volume: i32, player: &Player) {
        self.record(format!("volume {} {}", volume, player.id));
    }
}

impl CurrentPlaylistCallback for Recorder {
    fn on_add_tracks(&self, _state: &PlayerState) {
        self.record("add_tracks".to_string());
    }

    fn on_delete(&self, _state: &PlayerState, index: i32) {
        self.record(format!("delete {}", index));
    }
}

impl MusicChangedCallback for Recorder {
    fn on_music_changed(&self, state: &PlayerState) {
        let title = state.current_song.as_ref().map_or("", |s| s.name());
        self.record(format!("music_changed {}", title));
    }
}

impl PlaylistMaintenanceCallback for Recorder {
    fn on_create_failed(&self, name: &str) {
        self.record(format!("create_failed {}", name));
    }

    fn on_rename_failed(&self, new_name: &str) {
        self.record(format!("rename_failed {}", new_name));
    }
}

impl ItemListCallback for Recorder {
    fn on_items_received(&self, batch: ItemBatch) {
        self.record(format!(
            "items {} {} {}",
            batch.start,
            batch.items.len(),
            batch.count
        ));
    }
}

impl WakeLock for Recorder {
    fn set_held(&self, held: bool) {
        self.record(format!("wake_lock {}", held));
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn engine_with(options: EngineOptions) -> (Engine, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let engine =
        Engine::new(Arc::new(Callbacks::new()), options).with_wake_lock(recorder.clone());
    (engine, recorder)
}

pub(crate) fn engine() -> (Engine, Arc<Recorder>) {
    engine_with(EngineOptions::default())
}

/// Connect and run the whole handshake, leaving nothing outgoing.
pub(crate) fn handshake(engine: &mut Engine) {
    engine.connect("lms", 9090, Some("admin".to_string()), Some("secret".to_string()));
    engine.transport_opened();
    engine.handle_line("login admin ******");
    engine.handle_line("version 8.3.1");
    engine.take_outgoing();
}

/// Answer the first `players` request of a connection.
pub(crate) fn load_players(engine: &mut Engine, players: &[&str]) {
    let mut line = format!("players 0 20 correlationid%3A1 count%3A{}", players.len());
    for (index, id) in players.iter().enumerate() {
        line.push_str(&format!(
            " playerindex%3A{} playerid%3A{} name%3APlayer{} canpoweroff%3A1 connected%3A1",
            index, id, index
        ));
    }
    engine.handle_line(&line);
}

fn subscribe(id: &str, level: SubscriptionLevel) -> String {
    format!(
        "{} status - 1 subscribe:{} tags:aCdejJKlstxyu",
        id,
        level.token()
    )
}

// =============================================================================
// Handshake and connection lifecycle
// =============================================================================

#[test]
fn test_handshake_sequence() {
    let (mut engine, recorder) = engine();
    let me = ClientId::next();
    engine.callbacks.connection.register(me, recorder.clone());
    engine.register_handshake_callback(me, recorder.clone());

    assert!(matches!(
        engine.playlists_new("Road Trip"),
        Err(ClientError::NotConnected)
    ));

    engine.connect("lms", 9090, Some("admin".to_string()), Some("secret".to_string()));
    assert!(engine.is_connect_in_progress());
    assert!(engine.take_outgoing().is_empty());

    engine.transport_opened();
    assert_eq!(engine.take_outgoing(), vec!["login admin secret"]);
    assert_eq!(engine.handshake_phase(), HandshakePhase::AwaitingLogin);

    // Queued behind the handshake
    engine.playlists_new("Road Trip").unwrap();

    engine.handle_line("login admin ******");
    let mut expected = vec!["players 0 20 correlationid:1".to_string()];
    expected.extend(CAPABILITY_QUERIES.iter().map(|q| q.to_string()));
    assert_eq!(engine.take_outgoing(), expected);
    assert!(!engine.is_handshake_complete());

    engine.handle_line("version 8.3.1");
    assert!(engine.is_handshake_complete());
    let sent = engine.take_outgoing();
    assert!(sent[0].starts_with("getstring ALL_SONGS,ALBUMS,ARTISTS"));
    assert_eq!(sent[1], "playlists new name:Road%20Trip");
    assert_eq!(sent.len(), 2);
    assert_eq!(
        engine.connection().unwrap().server_version.as_deref(),
        Some("8.3.1")
    );

    assert_eq!(recorder.take(), vec!["connection true true false", "handshake"]);
}

#[test]
fn test_version_before_login_completes_handshake() {
    let (mut engine, recorder) = engine();
    engine.register_handshake_callback(ClientId::next(), recorder.clone());

    engine.connect("lms", 9090, None, None);
    engine.transport_opened();
    engine.take_outgoing();

    engine.handle_line("version 7.9");
    assert!(engine.is_handshake_complete());
    assert_eq!(recorder.take(), vec!["handshake"]);
    assert!(!engine.take_outgoing().contains(&"listen 1".to_string()));

    // The late login echo still starts player and capability discovery
    engine.handle_line("login  ");
    let mut expected = vec!["players 0 20 correlationid:1".to_string()];
    expected.extend(CAPABILITY_QUERIES.iter().map(|q| q.to_string()));
    assert_eq!(engine.take_outgoing(), expected);
    assert!(recorder.take().is_empty());

    // The answer to `version ?` and a repeated login change nothing
    engine.handle_line("version 7.9");
    engine.handle_line("login  ");
    assert!(engine.take_outgoing().is_empty());
    assert!(recorder.take().is_empty());

    load_players(&mut engine, &[KITCHEN]);
    assert_eq!(
        engine.active_player().map(|p| p.id.as_str()),
        Some(KITCHEN)
    );
}

#[test]
fn test_late_handshake_registration_delivers_once() {
    let (mut engine, recorder) = engine();
    handshake(&mut engine);

    let me = ClientId::next();
    engine.register_handshake_callback(me, recorder.clone());
    engine.register_handshake_callback(me, recorder.clone());
    assert_eq!(recorder.take(), vec!["handshake"]);

    engine.handle_line("can musicfolder 1");
    engine.handle_line("version 8.3.1");
    assert!(recorder.take().is_empty());
}

#[test]
fn test_server_close_before_ready_is_login_failure() {
    let (mut engine, recorder) = engine();
    engine.callbacks.connection.register(ClientId::next(), recorder.clone());

    engine.connect("lms", 9090, Some("admin".to_string()), Some("wrong".to_string()));
    engine.transport_opened();
    engine.disconnect(true);
    assert_eq!(
        recorder.take(),
        vec!["connection true true false", "wake_lock false", "connection false false true"]
    );
    assert!(!engine.is_connected());

    handshake(&mut engine);
    recorder.take();
    engine.disconnect(true);
    assert_eq!(
        recorder.take(),
        vec!["wake_lock false", "connection false false false"]
    );
}

#[test]
fn test_transport_failure() {
    let (mut engine, recorder) = engine();
    engine.callbacks.connection.register(ClientId::next(), recorder.clone());

    engine.connect("lms", 9090, None, None);
    engine.transport_failed("connection refused");

    assert_eq!(recorder.take(), vec!["connection false true false"]);
    assert!(!engine.is_connect_in_progress());
    assert!(engine.connection().is_none());

    // A stale open after the failure is ignored
    engine.transport_opened();
    assert!(engine.take_outgoing().is_empty());
}

#[test]
fn test_disconnect_forgets_connection_state() {
    let (mut engine, recorder) = engine();
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN]);
    engine
        .request_items(ClientId::next(), "albums", 0, Vec::new(), recorder.clone())
        .unwrap();
    recorder.take();

    engine.disconnect(false);

    assert!(engine.connection().is_none());
    assert!(engine.players().is_empty());
    assert!(engine.active_player().is_none());
    assert!(engine.pending.is_empty());
    assert!(engine.take_outgoing().is_empty());
    assert_eq!(recorder.take(), vec!["wake_lock false"]);
    assert!(matches!(engine.play(), Err(ClientError::NotConnected)));
}

#[test]
fn test_server_strings_fetched_in_chunks() {
    let (mut engine, _recorder) = engine();
    handshake(&mut engine);

    engine.handle_line("getstring ALL_SONGS%3AAll%20Songs ALBUMS%3AAlbums");
    let sent = engine.take_outgoing();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("getstring ARTISTS,GENRES,YEARS"));

    let strings = &engine.connection().unwrap().server_strings;
    assert_eq!(strings.get(&ServerString::AllSongs).map(String::as_str), Some("All Songs"));
    assert_eq!(strings.get(&ServerString::Albums).map(String::as_str), Some("Albums"));

    // Nothing recognised: stop asking
    engine.handle_line("getstring SOMETHING_ELSE%3Ax");
    assert!(engine.take_outgoing().is_empty());
}

#[test]
fn test_capabilities_and_urls() {
    let (mut engine, _recorder) = engine();
    assert!(matches!(
        engine.can_favorites(),
        Err(ClientError::HandshakeNotComplete)
    ));

    engine.connect("lms", 9090, None, None);
    engine.transport_opened();
    engine.handle_line("login  ");
    engine.handle_line("can favorites items 1");
    engine.handle_line("can musicfolder 1");
    engine.handle_line("can randomplay 0");
    engine.handle_line("pref httpport 9000");
    engine.handle_line("pref mediadirs %2Fmusic%2C%2Fmore");
    assert!(matches!(
        engine.media_dirs(),
        Err(ClientError::HandshakeNotComplete)
    ));
    assert_eq!(engine.preferred_album_sort().ok(), None);

    engine.handle_line("version 8.3.1");
    assert!(engine.can_favorites().unwrap());
    assert!(engine.can_musicfolder().unwrap());
    assert!(!engine.can_randomplay().unwrap());
    assert!(!engine.can_myapps().unwrap());
    assert_eq!(engine.media_dirs().unwrap(), vec!["/music", "/more"]);
    assert_eq!(engine.preferred_album_sort().unwrap(), "album");
    assert_eq!(
        engine.album_art_url("42").unwrap(),
        "http://lms:9000/music/42/cover.jpg"
    );
    assert_eq!(
        engine.icon_url("/html/images/radio.png").unwrap(),
        "http://lms:9000/html/images/radio.png"
    );

    engine.handle_line("pref jivealbumsort artistalbum");
    assert_eq!(engine.preferred_album_sort().unwrap(), "artistalbum");
}

#[test]
fn test_urls_empty_without_http_port() {
    let (mut engine, _recorder) = engine();
    handshake(&mut engine);
    assert_eq!(engine.song_download_url("7").unwrap(), "");
}

// =============================================================================
// Players and the active player
// =============================================================================

#[test]
fn test_first_player_selected_after_listing() {
    let preferences = Arc::new(MemoryPreferences::new());
    let (engine, recorder) = engine();
    let mut engine = engine.with_preferences(preferences.clone());
    engine.register_players_callback(ClientId::next(), recorder.clone());
    handshake(&mut engine);

    load_players(&mut engine, &[KITCHEN, DEN]);

    assert_eq!(engine.active_player_id().map(PlayerId::as_str), Some(KITCHEN));
    assert_eq!(engine.players().len(), 2);
    assert_eq!(recorder.take(), vec!["players 2 a5b3c1"]);
    assert_eq!(
        engine.take_outgoing(),
        vec![status_command(&PlayerId::from(KITCHEN))]
    );
    assert_eq!(preferences.last_player().as_deref(), Some(KITCHEN));
}

#[test]
fn test_last_player_preferred_when_present() {
    let preferences = Arc::new(MemoryPreferences::with_last_player(DEN));
    let (engine, _recorder) = engine();
    let mut engine = engine.with_preferences(preferences.clone());
    handshake(&mut engine);

    load_players(&mut engine, &[KITCHEN, DEN]);
    assert_eq!(engine.active_player_id().map(PlayerId::as_str), Some(DEN));

    engine.change_active_player(Some(PlayerId::from(KITCHEN))).unwrap();
    assert_eq!(preferences.last_player().as_deref(), Some(KITCHEN));
}

#[test]
fn test_empty_listing_reports_no_active_player() {
    let (mut engine, recorder) = engine();
    engine.register_players_callback(ClientId::next(), recorder.clone());
    handshake(&mut engine);

    load_players(&mut engine, &[]);

    assert!(engine.active_player().is_none());
    assert_eq!(recorder.take(), vec!["players 0 -"]);
}

#[test]
fn test_players_listing_follows_pages() {
    let (mut engine, _recorder) = engine_with(EngineOptions {
        fade_in_secs: 0,
        page_size: 1,
    });
    engine.connect("lms", 9090, None, None);
    engine.transport_opened();
    engine.handle_line("login  ");
    assert_eq!(engine.take_outgoing()[0], "players 0 1 correlationid:1");
    engine.handle_line("version 8.3.1");
    engine.take_outgoing();

    engine.handle_line(
        "players 0 1 correlationid%3A1 count%3A2 playerindex%3A0 playerid%3Aa5b3c1 name%3AKitchen",
    );
    assert!(engine.active_player().is_none());
    assert_eq!(engine.take_outgoing(), vec!["players 1 1 correlationid:2"]);

    engine.handle_line(
        "players 1 1 correlationid%3A2 count%3A2 playerindex%3A1 playerid%3Ab7c8d9 name%3ADen",
    );
    let names: Vec<String> = engine.players().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Kitchen", "Den"]);
    assert_eq!(engine.active_player_id().map(PlayerId::as_str), Some(KITCHEN));
}

#[test]
fn test_switching_active_player() {
    let (mut engine, recorder) = engine();
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN, DEN]);
    engine.take_outgoing();
    engine.register_players_callback(ClientId::next(), recorder.clone());
    assert_eq!(recorder.take(), vec!["players 2 a5b3c1"]);

    // Same player again: nothing at all
    engine.change_active_player(Some(PlayerId::from(KITCHEN))).unwrap();
    assert!(engine.take_outgoing().is_empty());
    assert!(recorder.take().is_empty());

    engine.change_active_player(Some(PlayerId::from(DEN))).unwrap();
    assert_eq!(recorder.take(), vec!["players 2 b7c8d9"]);
    assert_eq!(
        engine.take_outgoing(),
        vec![status_command(&PlayerId::from(DEN))]
    );

    assert!(matches!(
        engine.change_active_player(Some(PlayerId::from("ff:ff"))),
        Err(ClientError::UnknownPlayer(_))
    ));
    assert_eq!(engine.active_player_id().map(PlayerId::as_str), Some(DEN));
}

#[test]
fn test_client_notification_relists_players() {
    let (mut engine, recorder) = engine();
    engine.register_service_callback(ClientId::next(), recorder.clone());
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN]);
    engine.take_outgoing();

    engine.handle_line("a5b3c1 client forget");

    assert!(engine.active_player().is_none());
    assert!(engine.players().is_empty());
    assert_eq!(
        engine.take_outgoing(),
        vec![
            "players 0 20 correlationid:2".to_string(),
            subscribe(KITCHEN, SubscriptionLevel::None),
        ]
    );
}

// =============================================================================
// Status reconciliation
// =============================================================================

#[test]
fn test_status_line_for_active_player() {
    let (mut engine, recorder) = engine();
    let me = ClientId::next();
    engine.register_service_callback(me, recorder.clone());
    engine.register_player_state_callback(me, recorder.clone());
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN]);
    assert_eq!(
        engine.take_outgoing(),
        vec![
            status_command(&PlayerId::from(KITCHEN)),
            subscribe(KITCHEN, SubscriptionLevel::RealTime),
        ]
    );
    recorder.take();

    engine.handle_line("a5b3c1 status - 1 power:1 mode:play playlist_cur_index:2");

    let state = &engine.player(KITCHEN).unwrap().state;
    assert!(state.powered_on);
    assert_eq!(state.play_status, Some(PlayStatus::Play));
    assert_eq!(state.current_playlist_index, 2);
    assert_eq!(
        recorder.take(),
        vec![
            "wake_lock true",
            "play_status play",
            "player_state a5b3c1",
            "power false true",
        ]
    );
    assert!(engine.take_outgoing().is_empty());

    // The same status again changes nothing
    engine.handle_line("a5b3c1 status - 1 power:1 mode:play playlist_cur_index:2");
    assert!(recorder.take().is_empty());
    assert!(engine.take_outgoing().is_empty());
}

#[test]
fn test_status_reports_shuffle_song_and_position() {
    let (mut engine, recorder) = engine();
    engine.register_service_callback(ClientId::next(), recorder.clone());
    engine
        .callbacks
        .music_changed
        .register(ClientId::next(), recorder.clone());
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN]);
    recorder.take();

    engine.handle_line(
        "a5b3c1 status - 1 playlist%20shuffle%3A1 playlist%20repeat%3A7 id%3A12 title%3ASo%20What time%3A3.5 duration%3A545",
    );
    assert_eq!(
        recorder.take(),
        vec!["music_changed So What", "shuffle true 1", "time 3 545"]
    );
    let state = &engine.player(KITCHEN).unwrap().state;
    assert_eq!(state.repeat, None);

    engine.handle_line(
        "a5b3c1 status - 1 playlist%20shuffle%3A0 id%3A12 title%3ASo%20What time%3A3.5 duration%3A545",
    );
    assert_eq!(recorder.take(), vec!["shuffle false 0"]);
}

#[test]
fn test_status_for_unknown_player_ignored() {
    let (mut engine, recorder) = engine();
    engine.register_player_state_callback(ClientId::next(), recorder.clone());
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN]);
    recorder.take();
    engine.take_outgoing();

    engine.handle_line("ff%3Aff status - 1 power:1");
    assert!(recorder.take().is_empty());
    assert!(engine.take_outgoing().is_empty());
}

#[test]
fn test_play_status_notifications() {
    let (mut engine, recorder) = engine();
    engine.register_service_callback(ClientId::next(), recorder.clone());
    engine
        .callbacks
        .current_playlist
        .register(ClientId::next(), recorder.clone());
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN, DEN]);
    engine.take_outgoing();
    recorder.take();

    engine.handle_line("a5b3c1 pause 1");
    assert_eq!(recorder.take(), vec!["wake_lock false", "play_status pause"]);

    engine.handle_line("a5b3c1 playlist play");
    assert_eq!(recorder.take(), vec!["wake_lock true", "play_status play"]);

    // Only the active player's notifications are routed
    engine.handle_line("b7c8d9 pause 1");
    assert!(recorder.take().is_empty());

    engine.handle_line("a5b3c1 playlist newsong So%20What 3");
    assert_eq!(
        engine.take_outgoing(),
        vec![status_command(&PlayerId::from(KITCHEN))]
    );

    engine.handle_line("a5b3c1 playlist delete 2");
    engine.handle_line("a5b3c1 playlist addtracks");
    assert_eq!(recorder.take(), vec!["delete 2", "add_tracks"]);
}

#[test]
fn test_volume_notifications() {
    let (mut engine, recorder) = engine();
    engine
        .callbacks
        .volume
        .register(ClientId::next(), recorder.clone());
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN, DEN]);

    engine.handle_line("b7c8d9 prefset server volume 40");
    assert!(recorder.take().is_empty());
    assert_eq!(engine.player(DEN).unwrap().state.volume, 40);

    engine.handle_line("a5b3c1 prefset server volume 35");
    assert_eq!(recorder.take(), vec!["volume 35 a5b3c1"]);
}

// =============================================================================
// Subscriptions
// =============================================================================

#[test]
fn test_one_command_per_subscription_transition() {
    let (mut engine, _recorder) = engine();
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN]);
    engine.take_outgoing();

    let first: Arc<dyn ServiceCallback> = Arc::new(Recorder::default());
    let second: Arc<dyn ServiceCallback> = Arc::new(Recorder::default());

    engine.register_service_callback(ClientId::next(), first.clone());
    assert_eq!(
        engine.take_outgoing(),
        vec![subscribe(KITCHEN, SubscriptionLevel::RealTime)]
    );

    engine.register_service_callback(ClientId::next(), second.clone());
    engine.update_all_subscriptions();
    assert!(engine.take_outgoing().is_empty());

    engine.unregister_service_callback(&first);
    assert!(engine.take_outgoing().is_empty());

    engine.unregister_service_callback(&second);
    assert_eq!(
        engine.take_outgoing(),
        vec![subscribe(KITCHEN, SubscriptionLevel::None)]
    );
}

#[test]
fn test_sleep_timer_forces_realtime() {
    let (mut engine, recorder) = engine();
    engine.register_player_state_callback(ClientId::next(), recorder.clone());
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN, DEN]);

    let sent = engine.take_outgoing();
    assert!(sent.contains(&subscribe(KITCHEN, SubscriptionLevel::RealTime)));
    assert!(sent.contains(&subscribe(DEN, SubscriptionLevel::OnChange)));

    engine.handle_line("b7c8d9 status - 1 will_sleep_in:60 sleep:60");
    assert_eq!(
        engine.take_outgoing(),
        vec![subscribe(DEN, SubscriptionLevel::RealTime)]
    );

    engine.handle_line("b7c8d9 status - 1 will_sleep_in:59 sleep:60");
    assert!(engine.take_outgoing().is_empty());

    engine.handle_line("b7c8d9 status - 1 sleep:60");
    assert_eq!(
        engine.take_outgoing(),
        vec![subscribe(DEN, SubscriptionLevel::OnChange)]
    );
}

#[test]
fn test_cancel_subscriptions_drops_observers_and_requests() {
    let (mut engine, recorder) = engine();
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN]);
    engine.take_outgoing();

    let me = ClientId::next();
    engine.register_service_callback(me, recorder.clone());
    engine.register_handshake_callback(me, recorder.clone());
    engine
        .request_items(me, "genres", 0, Vec::new(), recorder.clone())
        .unwrap();
    engine.take_outgoing();

    assert_eq!(engine.cancel_subscriptions(me), 2);
    assert!(engine.pending.is_empty());
    assert_eq!(
        engine.take_outgoing(),
        vec![subscribe(KITCHEN, SubscriptionLevel::None)]
    );
}

// =============================================================================
// Item lists
// =============================================================================

#[test]
fn test_item_requests_require_handshake() {
    let (mut engine, recorder) = engine();
    let me = ClientId::next();
    assert!(matches!(
        engine.request_items(me, "albums", 0, Vec::new(), recorder.clone()),
        Err(ClientError::HandshakeNotComplete)
    ));

    handshake(&mut engine);
    assert!(matches!(
        engine.request_items(me, "bogus", 0, Vec::new(), recorder.clone()),
        Err(ClientError::InvalidArgument(_))
    ));
    assert!(matches!(
        engine.request_player_items(me, "status", 0, Vec::new(), recorder.clone()),
        Err(ClientError::NoActivePlayer)
    ));
}

#[test]
fn test_fetch_all_pages_until_cancelled() {
    let (mut engine, recorder) = engine();
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN]);
    engine.take_outgoing();

    let me = ClientId::next();
    engine
        .request_items(me, "albums", -1, Vec::new(), recorder.clone())
        .unwrap();
    assert_eq!(engine.take_outgoing(), vec!["albums 0 20 correlationid:2"]);

    engine.handle_line(
        "albums 0 20 correlationid%3A2 count%3A3 id%3A1 album%3AKind%20of%20Blue id%3A2 album%3AMilestones",
    );
    assert_eq!(recorder.take(), vec!["items 0 2 3"]);
    assert_eq!(engine.take_outgoing(), vec!["albums 2 20 correlationid:3"]);

    engine.cancel_subscriptions(me);
    engine.handle_line("albums 2 20 correlationid%3A3 count%3A3 id%3A3 album%3AFlamenco%20Sketches");
    assert!(recorder.take().is_empty());
    assert!(engine.take_outgoing().is_empty());
}

#[test]
fn test_player_item_request() {
    let (mut engine, recorder) = engine();
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN]);
    engine.take_outgoing();

    engine
        .request_player_items(
            ClientId::next(),
            "status",
            0,
            vec!["tags:aCdejJKlstxyu".to_string()],
            recorder.clone(),
        )
        .unwrap();
    assert_eq!(
        engine.take_outgoing(),
        vec!["a5b3c1 status 0 20 tags:aCdejJKlstxyu correlationid:2"]
    );

    engine.handle_line(
        "a5b3c1 status 0 20 tags%3AaCdejJKlstxyu correlationid%3A2 count%3A1 playlist%20index%3A0 id%3A12 title%3ASo%20What",
    );
    assert_eq!(recorder.take(), vec!["items 0 1 1"]);
}

// =============================================================================
// Commands
// =============================================================================

#[test]
fn test_playback_commands_need_active_player() {
    let (mut engine, _recorder) = engine();
    handshake(&mut engine);
    assert!(matches!(engine.play(), Err(ClientError::NoActivePlayer)));
    assert!(matches!(
        engine.sleep(&PlayerId::from(KITCHEN), 60),
        Err(ClientError::UnknownPlayer(_))
    ));
}

#[test]
fn test_toggle_pause_play_follows_status() {
    let (mut engine, _recorder) = engine_with(EngineOptions {
        fade_in_secs: 3,
        page_size: 20,
    });
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN]);
    engine.take_outgoing();

    engine.toggle_pause_play().unwrap();
    assert_eq!(engine.take_outgoing(), vec!["a5b3c1 play 3"]);

    engine.handle_line("a5b3c1 status - 1 mode:play");
    engine.toggle_pause_play().unwrap();
    assert_eq!(engine.take_outgoing(), vec!["a5b3c1 pause 1"]);

    engine.handle_line("a5b3c1 status - 1 mode:pause");
    engine.toggle_pause_play().unwrap();
    assert_eq!(engine.take_outgoing(), vec!["a5b3c1 pause 0 3"]);

    assert!(!engine.next_track().unwrap());
    assert!(engine.take_outgoing().is_empty());
}

#[test]
fn test_volume_commands() {
    let (mut engine, _recorder) = engine();
    handshake(&mut engine);
    load_players(&mut engine, &[KITCHEN]);
    engine.take_outgoing();

    engine.adjust_volume_to(130).unwrap();
    engine.adjust_volume_by(5).unwrap();
    engine.adjust_volume_by(-5).unwrap();
    assert_eq!(
        engine.take_outgoing(),
        vec![
            "a5b3c1 mixer volume 100",
            "a5b3c1 mixer volume %2B5",
            "a5b3c1 mixer volume -5",
        ]
    );

    engine.adjust_volume_by(0).unwrap();
    assert!(engine.take_outgoing().is_empty());

    assert!(matches!(
        engine.set_seconds_elapsed(-1),
        Err(ClientError::InvalidArgument(_))
    ));
}

#[test]
fn test_playlist_rename_checks_for_clash() {
    let (mut engine, recorder) = engine();
    engine
        .callbacks
        .playlist_maintenance
        .register(ClientId::next(), recorder.clone());
    handshake(&mut engine);

    engine.playlists_rename("7", "Road Trip").unwrap();
    assert_eq!(
        engine.take_outgoing(),
        vec!["playlists rename playlist_id:7 dry_run:1 newname:Road%20Trip"]
    );

    engine.handle_line("playlists rename playlist_id%3A7 dry_run%3A1 newname%3ARoad%20Trip");
    assert_eq!(
        engine.take_outgoing(),
        vec!["playlists rename playlist_id:7 newname:Road%20Trip"]
    );
    assert!(recorder.take().is_empty());

    engine.handle_line(
        "playlists rename playlist_id%3A7 dry_run%3A1 newname%3ARoad%20Trip overwritten_playlist_id%3A9",
    );
    assert!(engine.take_outgoing().is_empty());
    assert_eq!(recorder.take(), vec!["rename_failed Road Trip"]);

    engine.handle_line("playlists new name%3AMix overwritten_playlist_id%3A3");
    assert_eq!(recorder.take(), vec!["create_failed Mix"]);
}
