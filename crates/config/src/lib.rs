//! Configuration loading, validation, and management for Tallygram.
//!
//! Loads configuration from `~/.tallygram/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.tallygram/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Telegram transport settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Google Sheets ledger settings
    #[serde(default)]
    pub sheets: SheetsConfig,

    /// Record store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Tracking dialogue settings
    #[serde(default)]
    pub tracking: TrackingConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Long-poll timeout in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Bearer token for the Sheets REST API. Obtaining and refreshing it is
    /// deployment plumbing, outside this process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Override the API base URL (tests, proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Which questionnaire a `/track` dialogue runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// The fixed seven-field questionnaire.
    #[default]
    Legacy,
    /// The user's own measurement list.
    Dynamic,
}

impl std::fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default)]
    pub mode: TrackingMode,
}

fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

fn default_db_path() -> String {
    AppConfig::config_dir()
        .join("tallygram.db")
        .to_string_lossy()
        .into_owned()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("telegram", &self.telegram)
            .field("sheets", &self.sheets)
            .field("store", &self.store)
            .field("tracking", &self.tracking)
            .finish()
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("access_token", &redact(&self.access_token))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tallygram/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `TALLYGRAM_BOT_TOKEN`
    /// - `TALLYGRAM_SHEETS_TOKEN`
    /// - `TALLYGRAM_DB_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(token) = std::env::var("TALLYGRAM_BOT_TOKEN") {
            config.telegram.bot_token = Some(token);
        }
        if let Ok(token) = std::env::var("TALLYGRAM_SHEETS_TOKEN") {
            config.sheets.access_token = Some(token);
        }
        if let Ok(path) = std::env::var("TALLYGRAM_DB_PATH") {
            config.store.db_path = path;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tallygram")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.poll_timeout_secs == 0 || self.telegram.poll_timeout_secs > 300 {
            return Err(ConfigError::ValidationError(
                "telegram.poll_timeout_secs must be between 1 and 300".into(),
            ));
        }

        if self.store.db_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "store.db_path must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Whether the Telegram transport can start.
    pub fn has_bot_token(&self) -> bool {
        self.telegram.bot_token.is_some()
    }

    /// Whether the Sheets ledger can be reached.
    pub fn has_sheets_token(&self) -> bool {
        self.sheets.access_token.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                bot_token: None,
                poll_timeout_secs: default_poll_timeout(),
            },
            sheets: SheetsConfig::default(),
            store: StoreConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
