use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Rest period started after a set is completed, in seconds.
pub const DEFAULT_REST_SECONDS: u32 = 90;

/// Seconds added to the running rest timer by one extension.
pub const REST_EXTENSION_SECONDS: u32 = 30;

/// Cadence of both the elapsed-time and the rest countdown ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Ticks buffered between the tickers and `SessionEngine::next_tick`.
/// Further ticks are dropped until the host catches up.
pub const TICK_BUFFER: usize = 8;

/// Format version written into exported documents.
pub const EXPORT_VERSION: &str = "1.0";

/// Number of workouts shown in the recent history summary.
pub const RECENT_HISTORY_LIMIT: usize = 5;

/// Cache generation tag. Bumping it evicts every older cache on activation.
pub const CACHE_VERSION: &str = "fittracker-v1";

/// Document served when a navigation fails and has no cached copy.
pub const ROOT_DOCUMENT: &str = "/fitness.html";

/// Assets materialized into the cache at install time.
pub const PRECACHE_MANIFEST: &[&str] = &[
    "/fitness.html",
    "/styles/fitness.css",
    "/scripts/fitness.js",
    "/icon/default.png",
    "/manifest.json",
];

/// Top-level configuration for the tracker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Rest duration started by a completed set.
    pub rest_seconds: u32,
    /// Seconds added per rest extension.
    pub rest_extension_seconds: u32,
    /// JSON file holding the persisted session state.
    pub state_path: PathBuf,
    pub cache: CacheConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            rest_seconds: DEFAULT_REST_SECONDS,
            rest_extension_seconds: REST_EXTENSION_SECONDS,
            state_path: PathBuf::from("fitnessAppData.json"),
            cache: CacheConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Read the config from a JSON file. A missing or unreadable file yields defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("config {} is not valid JSON, using defaults: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Settings for the offline cache gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub version: String,
    /// Origin whose GET requests are intercepted, e.g. `https://fit.example`.
    pub origin: String,
    /// Relative asset paths fetched at install time.
    pub manifest: Vec<String>,
    pub root_document: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
            origin: "http://localhost".to_string(),
            manifest: PRECACHE_MANIFEST.iter().map(|p| p.to_string()).collect(),
            root_document: ROOT_DOCUMENT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: TrackerConfig =
            serde_json::from_str(r#"{"rest_seconds": 60, "cache": {"version": "v9"}}"#).unwrap();
        assert_eq!(config.rest_seconds, 60);
        assert_eq!(config.rest_extension_seconds, REST_EXTENSION_SECONDS);
        assert_eq!(config.cache.version, "v9");
        assert_eq!(config.cache.manifest.len(), PRECACHE_MANIFEST.len());
    }

    #[test]
    fn missing_file_is_default() {
        let config = TrackerConfig::load(Path::new("/definitely/not/here.json"));
        assert_eq!(config.rest_seconds, DEFAULT_REST_SECONDS);
    }
}
