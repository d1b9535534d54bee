use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Discord bot configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DiscordConfig {
    /// Bot token
    #[serde(default)]
    pub token: String,
    /// User ids allowed to run `/checkpoint` and `/reset`
    #[serde(default)]
    pub operators: Vec<u64>,
}

/// Which durable image the store is loaded from and checkpointed to
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Sqlite,
}

/// Snapshot storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// JSON snapshot path (file backend)
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Database URL (sqlite backend)
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Periodic checkpoint interval, 0 disables it
    #[serde(default)]
    pub autosave_secs: u64,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("whispers.json")
}

fn default_database_url() -> String {
    "sqlite://whispers.db?mode=rwc".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: default_storage_path(),
            database_url: default_database_url(),
            autosave_secs: 0,
        }
    }
}

/// Whisper composition limits
#[derive(Debug, Deserialize, Clone)]
pub struct WhisperConfig {
    /// Longest body accepted, in characters
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,
    /// Raw target meaning "whoever opens it first"
    #[serde(default = "default_open_sentinel")]
    pub open_sentinel: String,
}

fn default_max_body_chars() -> usize {
    200
}

fn default_open_sentinel() -> String {
    "@all".to_string()
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            max_body_chars: default_max_body_chars(),
            open_sentinel: default_open_sentinel(),
        }
    }
}

/// Root application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub whispers: WhisperConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., WHISPERBOT_DISCORD__TOKEN, WHISPERBOT_STORAGE__BACKEND
            .add_source(
                Environment::with_prefix("WHISPERBOT")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("discord.operators")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl StorageConfig {
    pub fn autosave_interval(&self) -> Option<std::time::Duration> {
        (self.autosave_secs > 0).then(|| std::time::Duration::from_secs(self.autosave_secs))
    }
}
