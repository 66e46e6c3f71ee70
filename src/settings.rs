//! Application settings
//!
//! Loaded once at startup from the platform config dir, created with
//! defaults on first run. Every field has a default so settings files
//! from older builds keep loading.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds between automatic captures
    #[serde(default = "default_snapshot_freq")]
    pub snapshot_freq: u64,
    /// Persist the store every this many captures
    #[serde(default = "default_save_freq")]
    pub save_freq: u32,
    /// Drop history frames older than this many seconds (0 = keep all)
    #[serde(default)]
    pub history_ttl: u64,
    /// Maximum history frames kept per snapshot
    #[serde(default = "default_history_max")]
    pub history_max: usize,
    /// Suspend automatic captures without stopping the daemon
    #[serde(default)]
    pub pause_snapshots: bool,
    /// Position freshly spawned windows from their last known instance
    #[serde(default = "default_true")]
    pub react_to_new_windows: bool,
    /// Rank last-known-instance candidates by title overlap
    #[serde(default = "default_true")]
    pub match_by_title: bool,
    /// Only accept last-known-instance candidates with the same
    /// resizability (keeps splash screens out of the match)
    #[serde(default = "default_true")]
    pub match_resizability: bool,
    /// Center new windows on the cursor when nothing else matches
    #[serde(default)]
    pub center_new_windows: bool,
    /// Seconds between display/window polls in the watcher threads
    #[serde(default = "default_poll_freq")]
    pub poll_freq: u64,
}

fn default_snapshot_freq() -> u64 {
    30
}

fn default_save_freq() -> u32 {
    1
}

fn default_history_max() -> usize {
    constants::history::DEFAULT_MAX_FRAMES
}

fn default_true() -> bool {
    true
}

fn default_poll_freq() -> u64 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snapshot_freq: default_snapshot_freq(),
            save_freq: default_save_freq(),
            history_ttl: 0,
            history_max: default_history_max(),
            pause_snapshots: false,
            react_to_new_windows: true,
            match_by_title: true,
            match_resizability: true,
            center_new_windows: false,
            poll_freq: default_poll_freq(),
        }
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(constants::config::APP_DIR);
        path.push(constants::config::SETTINGS_FILENAME);
        path
    }

    /// Load settings or create the default file
    pub fn load() -> Result<Self> {
        let path = Self::path();
        if !path.exists() {
            info!(path = %path.display(), "settings file not found, creating defaults");
            let settings = Settings::default();
            settings.save()?;
            return Ok(settings);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings from {:?}", path))?;
        let settings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings from {:?}", path))?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        fs::write(&path, json).with_context(|| format!("failed to write settings to {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"snapshot_freq": 5}"#).unwrap();
        assert_eq!(settings.snapshot_freq, 5);
        assert_eq!(settings.save_freq, 1);
        assert_eq!(settings.history_max, 10);
        assert!(settings.react_to_new_windows);
    }

    #[test]
    fn test_round_trip() {
        let settings = Settings { snapshot_freq: 60, history_ttl: 3600, ..Settings::default() };
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(serde_json::from_str::<Settings>(&json).unwrap(), settings);
    }
}
