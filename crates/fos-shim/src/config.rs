//! Shim Configuration
//!
//! The explicit replacement for the engine's ambient preference globals.
//! One `ShimConfig` is handed to every component at construction.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fallback download URL used when a subscription keeps failing.
pub const DEFAULT_FALLBACK_URL: &str = "https://adblockplus.org/getSubscription?version=%VERSION%&url=%SUBSCRIPTION%&downloadURL=%URL%&error=%ERROR%&channelStatus=%CHANNELSTATUS%&responseStatus=%RESPONSESTATUS%";

/// Complete shim configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    /// Directory holding filter storage and backups
    pub data_directory: PathBuf,

    /// Allow automatic subscription updates (the host still has a veto)
    pub autoupdate_enabled: bool,

    /// Locale override; `None` asks the host
    pub locale: Option<String>,

    /// Fallback subscription URL template
    pub fallback_url: String,

    /// Download failures before the fallback URL is consulted
    pub fallback_errors: u32,

    /// Number of filter storage backups to keep
    pub backup_count: u32,

    /// Hours between filter storage backups
    pub backup_interval_hours: u32,

    /// Version reported to the engine
    pub addon_version: String,

    /// Separator used when appending path segments
    pub path_separator: char,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("."),
            autoupdate_enabled: true,
            locale: None,
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
            fallback_errors: 5,
            backup_count: 5,
            backup_interval_hours: 24,
            addon_version: env!("CARGO_PKG_VERSION").to_string(),
            path_separator: std::path::MAIN_SEPARATOR,
        }
    }
}

impl ShimConfig {
    /// Configuration rooted at `data_directory`, everything else default.
    pub fn with_data_directory(data_directory: impl Into<PathBuf>) -> Self {
        Self {
            data_directory: data_directory.into(),
            ..Self::default()
        }
    }

    /// Load a JSON configuration file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading shim config from {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Data directory as a host path string.
    pub fn data_path(&self) -> String {
        self.data_directory.to_string_lossy().into_owned()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_directory.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDirectory);
        }
        if self.backup_count > 0 && self.backup_interval_hours == 0 {
            return Err(ConfigError::ZeroBackupInterval);
        }
        if !self.fallback_url.contains("%SUBSCRIPTION%") {
            return Err(ConfigError::FallbackUrl(self.fallback_url.clone()));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Data directory must not be empty")]
    EmptyDataDirectory,

    #[error("Backup interval must be positive when backups are enabled")]
    ZeroBackupInterval,

    #[error("Fallback URL lacks a %SUBSCRIPTION% placeholder: {0}")]
    FallbackUrl(String),
}
