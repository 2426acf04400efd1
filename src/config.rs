use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::SyncError;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_TENANCY: &str = "squadcast.com";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub log_level: String,
    pub log_file: String,
    pub timeout_seconds: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            log_file: "squadcast_slack_sync.log".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Recognized for config-file compatibility. No retry logic consumes these
/// values yet; they are parsed and ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlackSettings {
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_seconds: 2,
        }
    }
}

/// Cadence is owned by whatever external scheduler invokes the binary, so
/// `sync_interval_minutes` is accepted but unused.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SquadcastSettings {
    pub sync_interval_minutes: u64,
}

impl Default for SquadcastSettings {
    fn default() -> Self {
        Self {
            sync_interval_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sync_settings: SyncSettings,
    pub slack_settings: SlackSettings,
    pub squadcast_settings: SquadcastSettings,
}

/// Where the effective configuration came from. Returned alongside the config
/// so the caller can log it once the logger is actually up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    MissingFile(PathBuf),
    InvalidFile { path: PathBuf, reason: String },
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => {
                write!(f, "Loaded configuration from {}", path.display())
            }
            ConfigSource::MissingFile(path) => write!(
                f,
                "Configuration file not found at {}, using defaults",
                path.display()
            ),
            ConfigSource::InvalidFile { path, reason } => write!(
                f,
                "Error loading config from {}: {}. Using default configuration",
                path.display(),
                reason
            ),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, falling back to defaults when the
    /// file is absent or unreadable. Unknown sections and keys are ignored;
    /// missing keys within a present section take their default values.
    pub fn load(path: &Path) -> (AppConfig, ConfigSource) {
        if !path.exists() {
            return (AppConfig::default(), ConfigSource::MissingFile(path.to_path_buf()));
        }

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                return (
                    AppConfig::default(),
                    ConfigSource::InvalidFile {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    },
                );
            }
        };

        match serde_json::from_str::<AppConfig>(&raw) {
            Ok(config) => (config, ConfigSource::File(path.to_path_buf())),
            Err(e) => (
                AppConfig::default(),
                ConfigSource::InvalidFile {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                },
            ),
        }
    }
}

/// Credentials and tenancy sourced from the environment. All three tokens are
/// required; a missing one is a fatal `SyncError::Config` raised before any
/// network activity.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub squadcast_refresh_token: String,
    pub squadcast_team_id: String,
    pub slack_bot_token: String,
    pub squadcast_tenancy: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, SyncError> {
        Ok(Self {
            squadcast_refresh_token: required_env("SQUADCAST_REFRESH_TOKEN")?,
            squadcast_team_id: required_env("SQUADCAST_TEAM_ID")?,
            slack_bot_token: required_env("SLACK_BOT_TOKEN")?,
            squadcast_tenancy: std::env::var("SQUADCAST_TENANCY")
                .unwrap_or_else(|_| DEFAULT_TENANCY.to_string()),
        })
    }

    /// `https://auth.{tenancy}` for the token exchange endpoint.
    pub fn squadcast_auth_base_url(&self) -> String {
        format!("https://auth.{}", self.squadcast_tenancy)
    }

    /// `https://api.{tenancy}` for the GraphQL endpoint.
    pub fn squadcast_api_base_url(&self) -> String {
        format!("https://api.{}", self.squadcast_tenancy)
    }
}

fn required_env(name: &str) -> Result<String, SyncError> {
    std::env::var(name).map_err(|_| {
        SyncError::Config(format!("environment variable {} required to be set", name))
    })
}
