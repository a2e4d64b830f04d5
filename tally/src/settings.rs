//! User settings with JSON persistence

use crate::error::{CalcError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const SETTINGS_FILE: &str = "settings.json";
const BUFFER_FILE: &str = "buffer.txt";

/// User-tunable behavior. Unknown or missing keys fall back to defaults so
/// old settings files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Round displayed floats to 10 decimal places
    pub round_results: bool,
    /// Persist the buffer and REPL history across sessions
    pub save_history: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            round_results: true,
            save_history: false,
        }
    }
}

impl Settings {
    /// Load from the config directory; any failure means defaults
    pub fn load() -> Self {
        let Some(path) = settings_path() else {
            return Settings::default();
        };
        match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => Settings::default(),
        }
    }

    /// Write to the config directory, creating it if needed
    pub fn store(&self) -> Result<()> {
        let path = settings_path()
            .ok_or_else(|| CalcError::io("cannot determine home directory"))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| CalcError::io(e.to_string()))?;
        fs::write(&path, raw)?;
        Ok(())
    }
}

/// Get home directory
pub fn dirs_home() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

/// `~/.tally`, the config directory
pub fn config_dir() -> Option<PathBuf> {
    dirs_home().map(|home| home.join(".tally"))
}

fn settings_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(SETTINGS_FILE))
}

/// Default location for the persisted buffer
pub fn buffer_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(BUFFER_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.round_results);
        assert!(!settings.save_history);
    }

    #[test]
    fn test_serde_roundtrip() {
        let settings = Settings {
            round_results: false,
            save_history: true,
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"save_history": true}"#).unwrap();
        assert!(settings.round_results);
        assert!(settings.save_history);
    }

    #[test]
    fn test_malformed_json_is_default() {
        let settings: Settings = serde_json::from_str("not json").unwrap_or_default();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_dirs_home_returns_some() {
        assert!(dirs_home().is_some());
    }
}
