//! Persistent client preferences (last active player).

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::get_config_file_path;

const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_player: Option<String>,
}

/// Key/value storage for the few values that outlive a connection.
///
/// Writes may block; the engine calls `set_last_player` off its serial path.
pub trait PreferenceStore: Send + Sync {
    fn last_player(&self) -> Option<String>;
    fn set_last_player(&self, player_id: Option<&str>) -> Result<()>;
}

/// Preferences kept in a JSON file.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `preferences.json` in the config directory.
    pub fn in_config_dir() -> Self {
        Self::new(get_config_file_path(PREFERENCES_FILE))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn load(&self) -> Preferences {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }
}

impl PreferenceStore for FilePreferences {
    fn last_player(&self) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load().last_player
    }

    fn set_last_player(&self, player_id: Option<&str>) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut prefs = self.load();
        prefs.last_player = player_id.map(str::to_string);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&prefs)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;

        debug!("Saved last player: {:?}", player_id);
        Ok(())
    }
}

/// In-memory preferences for tests and embedders without storage.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    prefs: Mutex<Preferences>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_last_player(player_id: &str) -> Self {
        Self {
            prefs: Mutex::new(Preferences {
                last_player: Some(player_id.to_string()),
            }),
        }
    }
}

impl PreferenceStore for MemoryPreferences {
    fn last_player(&self) -> Option<String> {
        self.prefs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_player
            .clone()
    }

    fn set_last_player(&self, player_id: Option<&str>) -> Result<()> {
        self.prefs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_player = player_id.map(str::to_string);
        Ok(())
    }
}
