//! Squeeze Control - command-line client
//!
//! Connects to the configured server and logs what its players do. With a
//! command argument (`players`, `play`, `pause`, `stop`, `next`, `previous`)
//! it runs that command against the active player and exits.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use squeeze_control::callbacks::{
    ClientId, ConnectionCallback, HandshakeCallback, MusicChangedCallback, PlayersCallback,
    ServiceCallback, VolumeCallback,
};
use squeeze_control::config::{self, FilePreferences};
use squeeze_control::model::{PlayStatus, Player, PlayerState};
use squeeze_control::{ClientBuilder, SqueezeClient};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Logs every event and tracks connection progress for `main`.
struct Console {
    /// `Some(true)` once the handshake completes, `Some(false)` if the
    /// connection failed or dropped.
    ready: watch::Sender<Option<bool>>,
}

impl ConnectionCallback for Console {
    fn on_connection_changed(&self, is_connected: bool, post_connect: bool, login_failed: bool) {
        if login_failed {
            warn!("Login failed: check username and password");
        }
        if !is_connected && (post_connect || login_failed) {
            self.ready.send_replace(Some(false));
        } else if !is_connected {
            info!("Disconnected");
        }
    }
}

impl HandshakeCallback for Console {
    fn on_handshake_completed(&self) {
        self.ready.send_replace(Some(true));
    }
}

impl PlayersCallback for Console {
    fn on_players_changed(&self, players: &[Player], active: Option<&Player>) {
        info!(
            "{} player(s), active: {}",
            players.len(),
            active.map(|p| p.name.as_str()).unwrap_or("none")
        );
    }
}

impl ServiceCallback for Console {
    fn on_play_status_changed(&self, status: PlayStatus) {
        info!("Play status: {}", status);
    }

    fn on_power_status_changed(&self, can_power_on: bool, can_power_off: bool) {
        info!("Power: can_on={} can_off={}", can_power_on, can_power_off);
    }
}

impl MusicChangedCallback for Console {
    fn on_music_changed(&self, state: &PlayerState) {
        if let Some(song) = &state.current_song {
            info!("Now playing: {} - {}", song.artist, song.name());
        }
    }
}

impl VolumeCallback for Console {
    fn on_volume_changed(&self, volume: i32, player: &Player) {
        info!("[{}] volume {}", player.name, volume);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "squeeze_control=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Squeeze Control v{} ({})",
        env!("SQC_VERSION"),
        env!("SQC_GIT_SHA")
    );

    let config = config::load_config()?;
    let command = std::env::args().nth(1);

    let client = ClientBuilder::from_config(&config)
        .preferences(Arc::new(FilePreferences::in_config_dir()))
        .build();

    let (ready_tx, mut ready_rx) = watch::channel(None);
    let console = Arc::new(Console { ready: ready_tx });
    let me = ClientId::next();
    client.register_connection_callback(me, console.clone());
    client.register_volume_callback(me, console.clone());
    client.register_music_changed_callback(me, console.clone());
    client.register_handshake_callback(me, console.clone()).await?;
    client.register_players_callback(me, console.clone()).await?;
    client.register_service_callback(me, console.clone()).await?;

    client
        .connect_with(&config)
        .await
        .context("Set SQC_HOST or `host` in the config file")?;

    let connected = *ready_rx
        .wait_for(Option::is_some)
        .await
        .context("Client stopped before connecting")?;
    if connected != Some(true) {
        client.shutdown();
        bail!("Could not connect to {:?}", config.host);
    }

    match command.as_deref() {
        None => {
            shutdown_signal().await;
        }
        Some(command) => {
            let result = run_command(&client, command).await;
            client.disconnect().await?;
            result?;
        }
    }

    client.shutdown();
    info!("Shutdown complete");
    Ok(())
}

async fn run_command(client: &SqueezeClient, command: &str) -> Result<()> {
    match command {
        "players" => {
            let mut pages = std::pin::pin!(client.item_stream("players", Vec::new()).await?);
            while let Some(batch) = pages.next().await {
                for player in &batch.items {
                    println!(
                        "{}\t{}",
                        player.get("playerid").unwrap_or_default(),
                        player.get("name").unwrap_or_default()
                    );
                }
            }
        }
        "play" => client.play().await?,
        "pause" => client.pause().await?,
        "stop" => client.stop().await?,
        "next" => {
            client.next_track().await?;
        }
        "previous" => {
            client.previous_track().await?;
        }
        other => bail!("Unknown command: {}", other),
    }
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
