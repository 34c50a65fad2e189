//! Application configuration
//!
//! Stored as JSON at `<config_dir>/sports-overlay/config.json`. Every field
//! has a default, so a partial or empty file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::{config, sync, validation};
use crate::layer::Locale;
use crate::sync::SyncMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Fallback polling cadence
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Snapshots and uploaded images (default: platform data dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Broadcast sockets (default: XDG_RUNTIME_DIR, then the cache dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_dir: Option<PathBuf>,

    /// Key storage and sync by game id instead of one global overlay
    #[serde(default)]
    pub scope_by_game: bool,

    #[serde(default)]
    pub locale: Locale,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval_ms() -> u64 {
    sync::POLL_INTERVAL_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            sync_mode: SyncMode::default(),
            poll_interval_ms: default_poll_interval_ms(),
            data_dir: None,
            runtime_dir: None,
            scope_by_game: false,
            locale: Locale::default(),
        }
    }
}

impl Config {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path.push(config::FILENAME);
        path
    }

    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!(path = %config_path.display(), "Config file not found, creating default config");
            let config = Config::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        let mut config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config JSON from {}", config_path.display()))?;
        config.validate_and_clamp();

        info!(path = %config_path.display(), sync_mode = ?config.sync_mode, "Loaded config");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        fs::write(config_path, json)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        info!(path = %config_path.display(), "Saved config");
        Ok(())
    }

    fn validate_and_clamp(&mut self) {
        use validation::*;

        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            warn!(poll_interval_ms = self.poll_interval_ms, min = MIN_POLL_INTERVAL_MS, "poll_interval_ms below minimum, clamping");
            self.poll_interval_ms = MIN_POLL_INTERVAL_MS;
        } else if self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            warn!(poll_interval_ms = self.poll_interval_ms, max = MAX_POLL_INTERVAL_MS, "poll_interval_ms exceeds maximum, clamping");
            self.poll_interval_ms = MAX_POLL_INTERVAL_MS;
        }

        if self.log_level.trim().is_empty() {
            warn!(using = %default_log_level(), "log_level is empty, using default");
            self.log_level = default_log_level();
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
            path.push(config::APP_DIR);
            path
        })
    }

    /// Directory holding broadcast sockets, if the platform offers one
    pub fn runtime_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.runtime_dir {
            return Some(dir.clone());
        }
        if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
            return Some(PathBuf::from(runtime_dir).join(config::APP_DIR));
        }
        dirs::cache_dir().map(|cache| cache.join(config::APP_DIR))
    }
}
