mod store;

pub use store::{ConfigKey, ConfigStore, ConfigValue, FileConfigStore, ImportConfig};

use crate::workload::WorkloadId;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const CACHE_FILE_NAME: &str = "blocklist.cache";
pub const STORE_FILE_NAME: &str = "blocklist.conf";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub import: ImportSettings,

    #[serde(default)]
    pub updates: UpdateConfig,

    /// Workloads registered with the daemon's controller at start-up.
    #[serde(default)]
    pub workloads: Vec<WorkloadId>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportSettings {
    /// Every n-th applied range emits a count-bearing progress event.
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpdateConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_hours: u64,
}

// Defaults
fn default_config_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_user_agent() -> String {
    concat!("BlocklistImport/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_progress_every() -> u64 {
    100
}
fn default_check_interval() -> u64 {
    24
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            logging: LoggingConfig::default(),
            fetch: FetchConfig::default(),
            import: ImportSettings::default(),
            updates: UpdateConfig::default(),
            workloads: vec![],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            progress_every: default_progress_every(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            check_interval_hours: default_check_interval(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config TOML")?;
        Ok(config)
    }

    /// Where the most recently fetched raw list lives.
    pub fn cache_path(&self) -> PathBuf {
        self.config_dir.join(CACHE_FILE_NAME)
    }

    /// Where the URL, refresh interval and list type are persisted.
    pub fn store_path(&self) -> PathBuf {
        self.config_dir.join(STORE_FILE_NAME)
    }
}
