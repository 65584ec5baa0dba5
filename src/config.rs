//! Daemon configuration.
//!
//! A small optional JSON file; a missing file means defaults, a broken
//! file means a warning and defaults. Nothing here is reloaded at
//! runtime — behavior flags live in `settings` and change over the
//! control channel instead.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

/// Where events are published to subscribers.
pub const DEFAULT_PUBLISH_ADDR: &str = "127.0.0.1:8999";
/// Where `load-settings` requests are accepted.
pub const DEFAULT_CONTROL_ADDR: &str = "127.0.0.1:8998";

const DEFAULT_DEBOUNCE_MS: u64 = 750;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_PROFILE_TOOL: &str = "powerprofilesctl";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub publish_addr: String,
    pub control_addr: String,
    /// Duplicate-suppression window for raw events.
    pub debounce_ms: u64,
    /// Mode-poller sampling interval.
    pub poll_interval_ms: u64,
    /// External power-profile command.
    pub profile_tool: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            publish_addr: DEFAULT_PUBLISH_ADDR.to_string(),
            control_addr: DEFAULT_CONTROL_ADDR.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            profile_tool: DEFAULT_PROFILE_TOOL.to_string(),
        }
    }
}

impl Config {
    /// Load from the default config path, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "bad config file, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "cannot read config, using defaults");
                }
                Self::default()
            }
        }
    }

    pub fn debounce_secs(&self) -> f64 {
        self.debounce_ms as f64 / 1000.0
    }
}

/// `$XDG_CONFIG_HOME/hweventd/config.json` (or `~/.config/...`).
pub fn config_path() -> PathBuf {
    config_base().join("hweventd").join("config.json")
}

/// Log directory next to the config.
pub fn log_dir() -> PathBuf {
    config_base().join("hweventd").join("logs")
}

fn config_base() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Config::load_from(Path::new("/nonexistent/config.json"));
        assert_eq!(cfg.publish_addr, DEFAULT_PUBLISH_ADDR);
        assert_eq!(cfg.debounce_ms, 750);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"debounce_ms": 250}"#).unwrap();

        let cfg = Config::load_from(&path);
        assert_eq!(cfg.debounce_ms, 250);
        assert_eq!(cfg.control_addr, DEFAULT_CONTROL_ADDR);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        let cfg = Config::load_from(&path);
        assert_eq!(cfg.poll_interval_ms, 500);
    }

    #[test]
    fn debounce_seconds_conversion() {
        let cfg = Config::default();
        assert!((cfg.debounce_secs() - 0.75).abs() < f64::EPSILON);
    }
}
