//! Rollback configuration
//!
//! Constants shared by the schedulers and the user-facing settings,
//! persisted as TOML in the platform-specific config directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Maximum number of controller ports tracked
pub const MAX_USERS: usize = 16;

/// Maximum run-ahead / preemptive frame count
pub const MAX_RUN_AHEAD_FRAMES: u32 = 12;

/// Initial slot capacity of snapshot and input lists
pub const INITIAL_LIST_CAPACITY: usize = 16;

/// Per-id input values held by a fresh shadow element before it must grow
pub const INPUT_STATE_BASELINE: usize = 32;

/// Input ids at or above this are never recorded in the shadow
pub const INPUT_ID_LIMIT: u32 = 65536;

/// Frames a save/load failure warning stays on screen
pub const FAILURE_MESSAGE_FRAMES: u32 = 3 * 60;

/// Frames a setup warning stays on screen
pub const SETUP_MESSAGE_FRAMES: u32 = 2 * 60;

/// Run-ahead / preemptive frames settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackConfig {
    /// Run ahead of real time to hide input latency (default: false)
    #[serde(default)]
    pub run_ahead_enabled: bool,
    /// Frames to run ahead, also the preemptive ring size (default: 1, range: 1-12)
    #[serde(default = "default_run_ahead_frames")]
    pub run_ahead_frames: u32,
    /// Use a second core instance for speculation (default: false)
    #[serde(default)]
    pub secondary_instance: bool,
    /// Suppress on-screen setup warnings (default: false)
    #[serde(default)]
    pub hide_warnings: bool,
    /// Use preemptive frames instead of run-ahead (default: false)
    #[serde(default)]
    pub preemptive_frames: bool,
    /// Number of active controller ports (default: 2, range: 1-16)
    #[serde(default = "default_max_users")]
    pub max_users: u32,
}

fn default_run_ahead_frames() -> u32 {
    1
}

fn default_max_users() -> u32 {
    2
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            run_ahead_enabled: false,
            run_ahead_frames: default_run_ahead_frames(),
            secondary_instance: false,
            hide_warnings: false,
            preemptive_frames: false,
            max_users: default_max_users(),
        }
    }
}

impl RollbackConfig {
    /// Frame count clamped to the supported range
    pub fn frames(&self) -> u32 {
        self.run_ahead_frames.clamp(1, MAX_RUN_AHEAD_FRAMES)
    }

    /// Active port count clamped to the supported range
    pub fn users(&self) -> usize {
        (self.max_users as usize).clamp(1, MAX_USERS)
    }

    /// Read a config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write a config file, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Config file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config could not be serialized: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the platform-specific configuration directory.
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.frameahead", "", "Frameahead")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads `rollback.toml` from the configuration directory.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> RollbackConfig {
    config_dir()
        .and_then(|dir| RollbackConfig::load_from(&dir.join("rollback.toml")).ok())
        .unwrap_or_default()
}
