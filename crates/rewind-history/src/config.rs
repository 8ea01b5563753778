/// Configuration for the history engine: defaults, file load/save, sanitize.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "REWIND_CONFIG";

/// Config file name used when no override is given.
const CONFIG_FILE_NAME: &str = "rewind.json";

/// Configuration for an `UndoRedoEngine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Whether mementos are recorded at all when the engine starts.
    pub track_operations: bool,
    /// Max operations kept per stack. `None` keeps everything.
    pub max_operations: Option<usize>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            track_operations: true,
            max_operations: None,
        }
    }
}

impl HistoryConfig {
    /// Resolves the config file path.
    ///
    /// Resolution order:
    /// 1. `REWIND_CONFIG` environment variable
    /// 2. `<user config dir>/rewind/rewind.json`
    /// 3. `rewind.json` in the working directory
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .map(|dir| dir.join("rewind").join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Loads config from `path`, creating a default file if it doesn't exist.
    /// Returns defaults on any error (unreadable file, parse error, etc.).
    pub fn load_or_create(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match serde_json::from_str::<HistoryConfig>(&contents) {
                    Ok(mut config) => {
                        config.sanitize();
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {}: {e}", path.display());
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {}: {e}", path.display());
                }
            }
            // Keep the broken file untouched
            Self::default()
        } else {
            let config = Self::default();
            if let Err(e) = config.save(path) {
                tracing::warn!("Failed to create default config at {}: {e}", path.display());
            }
            config
        }
    }

    /// Saves config to `path` as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Clamps values to valid ranges.
    pub fn sanitize(&mut self) {
        if let Some(max) = self.max_operations.as_mut() {
            *max = (*max).max(1);
        }
    }
}
