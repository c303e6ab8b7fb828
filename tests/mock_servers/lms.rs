//! Mock LMS (Logitech Media Server) for testing
//!
//! Speaks the line-based CLI on a TCP port: echoes commands the way the
//! server does, answers handshake queries and paged listings, and can push
//! notifications or drop its clients on demand.

use std::net::SocketAddr;
use std::sync::Arc;

use squeeze_control::protocol::{decode, decode_token, encode, encode_token, split_line};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

pub const HTTP_PORT: u16 = 9000;
pub const VERSION: &str = "8.3.1";

/// Mock player state
#[derive(Debug, Clone)]
pub struct MockPlayer {
    pub playerid: String,
    pub name: String,
    pub power: bool,
    pub mode: String, // "play", "pause", "stop"
    pub volume: i32,
}

impl MockPlayer {
    pub fn new(playerid: &str, name: &str) -> Self {
        Self {
            playerid: playerid.to_string(),
            name: name.to_string(),
            power: true,
            mode: "stop".to_string(),
            volume: 50,
        }
    }
}

/// Mock LMS server state
#[derive(Default)]
struct MockLmsState {
    players: Vec<MockPlayer>,
    albums: Vec<String>,
    password: Option<String>,
    /// Every line received, in order, as sent.
    received: Vec<String>,
    /// Notification feeds of the connected clients.
    clients: Vec<mpsc::UnboundedSender<String>>,
}

/// What to do after a received line.
struct Reply {
    lines: Vec<String>,
    close: bool,
}

impl Reply {
    fn lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            close: false,
        }
    }

    fn echo(line: &str) -> Self {
        Self::lines(vec![line.to_string()])
    }
}

/// Mock LMS Server
pub struct MockLmsServer {
    addr: SocketAddr,
    state: Arc<RwLock<MockLmsState>>,
    handle: JoinHandle<()>,
}

impl MockLmsServer {
    /// Start a mock LMS server on a random port
    pub async fn start() -> Self {
        let state = Arc::new(RwLock::new(MockLmsState::default()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve_client(socket, accept_state.clone()));
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Get the server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Add a player to the mock server
    pub async fn add_player(&self, playerid: &str, name: &str) {
        let mut state = self.state.write().await;
        state.players.push(MockPlayer::new(playerid, name));
    }

    pub async fn add_albums(&self, albums: &[&str]) {
        let mut state = self.state.write().await;
        state.albums.extend(albums.iter().map(|a| a.to_string()));
    }

    /// Require this password at login
    pub async fn set_password(&self, password: &str) {
        self.state.write().await.password = Some(password.to_string());
    }

    pub async fn mode(&self, playerid: &str) -> Option<String> {
        let state = self.state.read().await;
        state
            .players
            .iter()
            .find(|p| p.playerid == playerid)
            .map(|p| p.mode.clone())
    }

    /// Lines received so far, as sent by the client
    pub async fn received(&self) -> Vec<String> {
        self.state.read().await.received.clone()
    }

    /// Push an unsolicited line to every connected client
    pub async fn notify(&self, line: &str) {
        let state = self.state.read().await;
        for client in &state.clients {
            let _ = client.send(line.to_string());
        }
    }

    /// Close every client connection from the server side
    pub async fn drop_clients(&self) {
        self.state.write().await.clients.clear();
    }

    /// Stop the mock server
    pub async fn stop(self) {
        self.handle.abort();
    }
}

async fn serve_client(socket: TcpStream, state: Arc<RwLock<MockLmsState>>) {
    let (reader, mut writer) = socket.into_split();
    let mut lines = BufReader::new(reader).lines();
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    state.write().await.clients.push(notify_tx);

    loop {
        let reply = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let mut state = state.write().await;
                    state.received.push(line.clone());
                    respond(&mut state, &line)
                }
                _ => break,
            },
            note = notify_rx.recv() => match note {
                Some(line) => Reply::echo(&line),
                None => break,
            },
        };

        for line in &reply.lines {
            if writer.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                return;
            }
        }
        if reply.close {
            break;
        }
    }
}

/// Re-escape `key:value` parameters the way the server echoes them.
fn echo_params(params: &[&str]) -> Vec<String> {
    params
        .iter()
        .filter_map(|raw| decode_token(raw))
        .map(|(key, value)| encode_token(&key, value.as_deref()))
        .collect()
}

/// `<cmd> <start> <count> params..` with the page of records appended.
fn page(
    command: &str,
    tokens: &[&str],
    total: usize,
    record: impl Fn(usize) -> String,
) -> Reply {
    let start: usize = tokens.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
    let size: usize = tokens.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);

    let mut out = vec![
        command.to_string(),
        start.to_string(),
        size.to_string(),
    ];
    out.extend(echo_params(tokens.get(3..).unwrap_or_default()));
    out.push(format!("count%3A{}", total));
    out.extend((start..total.min(start + size)).map(record));
    Reply::echo(&out.join(" "))
}

fn respond(state: &mut MockLmsState, line: &str) -> Reply {
    let tokens = split_line(line);
    match tokens[0] {
        "login" => {
            let user = tokens.get(1).copied().unwrap_or_default();
            let password = tokens.get(2).map(|p| decode(p)).unwrap_or_default();
            let rejected = state.password.as_ref().is_some_and(|p| *p != password);
            Reply {
                lines: vec![format!("login {} ******", user)],
                close: rejected,
            }
        }
        "can" => Reply::echo(&line.replace('?', "1")),
        "pref" => {
            let value = match tokens.get(1).copied() {
                Some("httpport") => HTTP_PORT.to_string(),
                Some("jivealbumsort") => "album".to_string(),
                Some("mediadirs") => encode("/music"),
                _ => String::new(),
            };
            Reply::echo(&line.replace('?', &value))
        }
        "version" => Reply::echo(&format!("version {}", VERSION)),
        "getstring" => {
            let names = tokens.get(1).map(|n| decode(n)).unwrap_or_default();
            let mut out = vec![line.to_string()];
            out.extend(
                names
                    .split(',')
                    .map(|name| encode_token(name, Some(&name.to_lowercase()))),
            );
            Reply::echo(&out.join(" "))
        }
        "players" => {
            let players = state.players.clone();
            page("players", &tokens, players.len(), |i| {
                let p = &players[i];
                format!(
                    "playerindex%3A{} playerid%3A{} name%3A{} model%3Asqueezelite canpoweroff%3A1 connected%3A1 power%3A{}",
                    i,
                    encode(&p.playerid),
                    encode(&p.name),
                    u8::from(p.power)
                )
            })
        }
        "albums" => {
            let albums = state.albums.clone();
            page("albums", &tokens, albums.len(), |i| {
                format!("id%3A{} album%3A{}", i + 1, encode(&albums[i]))
            })
        }
        _ => {
            let id = decode(tokens[0]);
            match state.players.iter_mut().find(|p| p.playerid == id) {
                Some(player) => player_command(player, line, &tokens),
                None => Reply::echo(line),
            }
        }
    }
}

fn player_command(player: &mut MockPlayer, line: &str, tokens: &[&str]) -> Reply {
    match tokens.get(1).copied() {
        Some("status") if tokens.get(2) == Some(&"-") => {
            let mut out = vec![tokens[0].to_string(), "status - 1".to_string()];
            out.extend(echo_params(tokens.get(4..).unwrap_or_default()));
            out.push(format!("player_name%3A{}", encode(&player.name)));
            out.push(format!("power%3A{}", u8::from(player.power)));
            out.push(format!("mode%3A{}", player.mode));
            out.push(format!("mixer%20volume%3A{}", player.volume));
            out.push("playlist%20shuffle%3A0".to_string());
            out.push("playlist%20repeat%3A0".to_string());
            Reply::echo(&out.join(" "))
        }
        Some("play") => {
            player.mode = "play".to_string();
            Reply::echo(line)
        }
        Some("stop") => {
            player.mode = "stop".to_string();
            Reply::echo(line)
        }
        Some("pause") => {
            match tokens.get(2).copied() {
                Some("0") => player.mode = "play".to_string(),
                Some("1") => player.mode = "pause".to_string(),
                _ => {}
            }
            Reply::echo(line)
        }
        Some("mixer") if tokens.get(2) == Some(&"volume") => {
            let requested = tokens.get(3).map(|v| decode(v)).unwrap_or_default();
            player.volume = match requested.strip_prefix('+') {
                Some(delta) => player.volume + delta.parse::<i32>().unwrap_or(0),
                None => requested.parse().unwrap_or(player.volume),
            }
            .clamp(0, 100);
            Reply::lines(vec![
                line.to_string(),
                format!("{} prefset server volume {}", tokens[0], player.volume),
            ])
        }
        _ => Reply::echo(line),
    }
}
