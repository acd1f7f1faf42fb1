//! Daemon configuration.
//!
//! Loaded from a TOML file (default `$XDG_CONFIG_HOME/pomo/config.toml`).
//! Every key is optional; a missing default file yields the defaults.
//!
//! ```toml
//! socket_path = "/tmp/pomo.sock"
//! database_path = "/home/me/.local/share/pomo/pomo.db"
//! allowed_chat_id = 123456
//!
//! [timers]
//! work_secs = 1500
//! break_secs = 300
//! reminder_secs = 180
//! tick_millis = 1000
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pomo_core::{ChatId, Phase};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/pomo.sock";

/// Environment variable overriding `socket_path`
pub const SOCKET_ENV: &str = "POMO_SOCKET";

/// `database_path` value selecting the in-memory stores
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub socket_path: PathBuf,
    pub database_path: PathBuf,

    /// When set, commands from every other chat are ignored
    pub allowed_chat_id: Option<ChatId>,

    pub timers: TimerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            database_path: default_database_path(),
            allowed_chat_id: None,
            timers: TimerConfig::default(),
        }
    }
}

/// Phase lengths and scheduler cadence, in whole units as written in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimerConfig {
    pub work_secs: u64,
    pub break_secs: u64,
    pub reminder_secs: u64,
    pub tick_millis: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_secs: 25 * 60,
            break_secs: 5 * 60,
            reminder_secs: 3 * 60,
            tick_millis: 1000,
        }
    }
}

impl TimerConfig {
    pub fn settings(&self) -> TimerSettings {
        TimerSettings {
            work: Duration::from_secs(self.work_secs),
            short_break: Duration::from_secs(self.break_secs),
            reminder_interval: Duration::from_secs(self.reminder_secs),
            tick: Duration::from_millis(self.tick_millis),
        }
    }
}

/// Runtime timer settings shared by the scheduler and the broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    pub work: Duration,
    pub short_break: Duration,
    pub reminder_interval: Duration,
    pub tick: Duration,
}

impl TimerSettings {
    /// Countdown length of a timed phase; `None` for untimed phases.
    pub fn phase_length(&self, phase: Phase) -> Option<Duration> {
        match phase {
            Phase::Working => Some(self.work),
            Phase::OnBreak => Some(self.short_break),
            _ => None,
        }
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        TimerConfig::default().settings()
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config file {path}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pomo").join("config.toml"))
    }

    /// Loads configuration.
    ///
    /// An explicit `path` must exist. Without one, the default path is
    /// tried and defaults are used when it is absent. `POMO_SOCKET`
    /// overrides the socket path in both cases.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed, or a
    /// value fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_socket_override(env::var(SOCKET_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a config file without applying overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Replaces the socket path when an override is present and non-empty.
    pub fn apply_socket_override(&mut self, value: Option<String>) {
        if let Some(socket) = value.filter(|s| !s.trim().is_empty()) {
            debug!(socket = %socket, "Socket path overridden from {}", SOCKET_ENV);
            self.socket_path = PathBuf::from(socket);
        }
    }

    /// Rejects zero-length timers, which would spin the scheduler.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timers;
        let checks = [
            ("timers.work_secs", t.work_secs),
            ("timers.break_secs", t.break_secs),
            ("timers.reminder_secs", t.reminder_secs),
            ("timers.tick_millis", t.tick_millis),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Returns true when history and tasks should live in memory only.
    pub fn uses_in_memory_store(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_DATABASE
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("pomo")
        .join("pomo.db")
}
