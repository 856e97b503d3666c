//! Configuration for thuto
//!
//! Configuration is loaded from `~/.config/thuto/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/thuto/` (~/.config/thuto/)
//! - Data: `$XDG_DATA_HOME/thuto/` (~/.local/share/thuto/)
//! - State/Logs: `$XDG_STATE_HOME/thuto/` (~/.local/state/thuto/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// `$var/thuto`, falling back to `$HOME/<fallback>/thuto` when unset or empty.
fn xdg_app_dir(var: &str, fallback: &str) -> PathBuf {
    let base = match std::env::var_os(var) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::var_os("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(fallback),
    };
    base.join("thuto")
}

/// Top-level `config.toml`
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Analytics windows
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Database location override
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Windows and limits used by the dashboard and insights
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    /// Days scanned backwards when computing the learning streak
    #[serde(default = "default_streak_window_days")]
    pub streak_window_days: u32,

    /// Number of newest conversations treated as "recent"
    #[serde(default = "default_recent_conversations")]
    pub recent_conversations: usize,

    /// Number of monthly reports shown in the progress series
    #[serde(default = "default_progress_months")]
    pub progress_months: usize,

    /// Number of subjects in the time-per-subject ranking
    #[serde(default = "default_top_subjects")]
    pub top_subjects: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            streak_window_days: default_streak_window_days(),
            recent_conversations: default_recent_conversations(),
            progress_months: default_progress_months(),
            top_subjects: default_top_subjects(),
        }
    }
}

impl AnalyticsConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.streak_window_days == 0 {
            return Err(Error::Config(
                "analytics.streak_window_days must be at least 1".to_string(),
            ));
        }
        if self.recent_conversations == 0 {
            return Err(Error::Config(
                "analytics.recent_conversations must be at least 1".to_string(),
            ));
        }
        if self.progress_months == 0 || self.top_subjects == 0 {
            return Err(Error::Config(
                "analytics.progress_months and analytics.top_subjects must be at least 1"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn default_streak_window_days() -> u32 {
    30
}

fn default_recent_conversations() -> usize {
    10
}

fn default_progress_months() -> usize {
    6
}

fn default_top_subjects() -> usize {
    5
}

/// Database configuration
#[derive(Debug, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Override for the SQLite file location
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        self.analytics.validate()
    }

    /// Database path, honouring the `[database] path` override
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/thuto/config.toml` (~/.config/thuto/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_app_dir("XDG_CONFIG_HOME", ".config").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/thuto/` (~/.local/share/thuto/)
    pub fn data_dir() -> PathBuf {
        xdg_app_dir("XDG_DATA_HOME", ".local/share")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/thuto/` (~/.local/state/thuto/)
    pub fn state_dir() -> PathBuf {
        xdg_app_dir("XDG_STATE_HOME", ".local/state")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/thuto/data.db` (~/.local/share/thuto/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }
}
