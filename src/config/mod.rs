//! Configuration management

mod preferences;

pub use preferences::{FilePreferences, MemoryPreferences, PreferenceStore, Preferences};

use anyhow::Result;
use serde::Deserialize;

/// Default CLI port of the server.
pub const DEFAULT_CLI_PORT: u16 = 9090;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server host name or address.
    pub host: Option<String>,

    #[serde(default = "default_cli_port")]
    pub cli_port: u16,

    pub username: Option<String>,
    pub password: Option<String>,

    /// Fade-in applied to play and resume commands, in seconds.
    #[serde(default)]
    pub fade_in_secs: u32,

    /// Items per page for list queries.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Capacity of the client's work queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            cli_port: DEFAULT_CLI_PORT,
            username: None,
            password: None,
            fade_in_secs: 0,
            page_size: default_page_size(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_cli_port() -> u16 {
    DEFAULT_CLI_PORT
}

fn default_page_size() -> u32 {
    20
}

fn default_queue_capacity() -> usize {
    256
}

const APP_DIR_NAME: &str = "squeeze-control";

/// Get config directory (SQC_CONFIG_DIR, XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> std::path::PathBuf {
    if let Ok(dir) = std::env::var("SQC_CONFIG_DIR") {
        return std::path::PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return std::path::PathBuf::from(home)
                .join("Library/Application Support")
                .join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return std::path::PathBuf::from(xdg).join(APP_DIR_NAME);
        }
        if let Ok(home) = std::env::var("HOME") {
            return std::path::PathBuf::from(home)
                .join(".config")
                .join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return std::path::PathBuf::from(appdata).join(APP_DIR_NAME);
        }
    }

    // Fallback to current directory
    std::path::PathBuf::from(".")
}

/// Path of a file in the config directory
pub fn get_config_file_path(filename: &str) -> std::path::PathBuf {
    get_config_dir().join(filename)
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let mut builder = ::config::Config::builder()
        .set_default("cli_port", DEFAULT_CLI_PORT as i64)?
        .set_default("fade_in_secs", 0)?
        .set_default("page_size", default_page_size() as i64)?
        .set_default("queue_capacity", default_queue_capacity() as i64)?
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (SQC_HOST, SQC_CLI_PORT, etc.)
        .add_source(
            ::config::Environment::with_prefix("SQC")
                .separator("__")
                .try_parsing(true),
        );

    // Legacy LMS_HOST/LMS_CLI_PORT env vars; SQC_ values win
    if std::env::var("SQC_HOST").is_err() {
        if let Ok(host) = std::env::var("LMS_HOST") {
            builder = builder.set_override("host", host)?;
        }
    }
    if std::env::var("SQC_CLI_PORT").is_err() {
        if let Ok(port) = std::env::var("LMS_CLI_PORT") {
            if let Ok(port_num) = port.parse::<u16>() {
                builder = builder.set_override("cli_port", port_num as i64)?;
            }
        }
    }

    let config = builder.build()?;

    Ok(config.try_deserialize()?)
}
