//! Persistent import settings: source URL, refresh interval and list type.

use crate::error::ConfigError;
use crate::format::ListType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;
use tracing::{debug, info};

const DEFAULT_LOAD_AFTER_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    Url,
    LoadAfterDays,
    ListType,
}

impl ConfigKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::Url => "url",
            ConfigKey::LoadAfterDays => "load_after_days",
            ConfigKey::ListType => "listtype",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(ConfigKey::Url),
            "load_after_days" => Ok(ConfigKey::LoadAfterDays),
            "listtype" => Ok(ConfigKey::ListType),
            other => Err(ConfigError::UnknownKey(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Text(String),
    Integer(i64),
    ListType(ListType),
}

/// Key/value persistence for the import settings.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<(), ConfigError>;
    fn save(&self) -> Result<(), ConfigError>;
    fn get(&self, key: ConfigKey) -> Option<ConfigValue>;
    fn set(&self, key: ConfigKey, value: ConfigValue) -> Result<(), ConfigError>;
}

/// Typed view of the store, read at the start of every import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    pub url: Option<String>,
    pub load_after_days: i64,
    pub list_type: ListType,
}

impl ImportConfig {
    pub fn from_store(store: &dyn ConfigStore) -> Self {
        let url = match store.get(ConfigKey::Url) {
            Some(ConfigValue::Text(url)) if !url.trim().is_empty() => Some(url),
            _ => None,
        };
        let load_after_days = match store.get(ConfigKey::LoadAfterDays) {
            Some(ConfigValue::Integer(days)) => days,
            _ => DEFAULT_LOAD_AFTER_DAYS,
        };
        let list_type = match store.get(ConfigKey::ListType) {
            Some(ConfigValue::ListType(t)) => t,
            _ => ListType::default(),
        };
        Self {
            url,
            load_after_days,
            list_type,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoredValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    load_after_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    listtype: Option<ListType>,
}

/// TOML-backed store (`blocklist.conf`). A missing file loads as empty.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    values: RwLock<StoredValues>,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: RwLock::new(StoredValues::default()),
        }
    }

    /// Creates the store and loads whatever is already on disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<(), ConfigError> {
        let values = match std::fs::read_to_string(&self.path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No import config at {}, starting empty", self.path.display());
                StoredValues::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        *self.values.write().unwrap() = values;
        Ok(())
    }

    fn save(&self) -> Result<(), ConfigError> {
        let contents = toml::to_string(&*self.values.read().unwrap())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&self.path, contents).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!("Saved import config to {}", self.path.display());
        Ok(())
    }

    fn get(&self, key: ConfigKey) -> Option<ConfigValue> {
        let values = self.values.read().unwrap();
        match key {
            ConfigKey::Url => values.url.clone().map(ConfigValue::Text),
            ConfigKey::LoadAfterDays => values.load_after_days.map(ConfigValue::Integer),
            ConfigKey::ListType => values.listtype.map(ConfigValue::ListType),
        }
    }

    fn set(&self, key: ConfigKey, value: ConfigValue) -> Result<(), ConfigError> {
        let mut values = self.values.write().unwrap();
        match (key, value) {
            (ConfigKey::Url, ConfigValue::Text(url)) => values.url = Some(url),
            (ConfigKey::Url, _) => {
                return Err(ConfigError::TypeMismatch {
                    key: "url",
                    expected: "a string",
                })
            }
            (ConfigKey::LoadAfterDays, ConfigValue::Integer(days)) => {
                values.load_after_days = Some(days)
            }
            (ConfigKey::LoadAfterDays, _) => {
                return Err(ConfigError::TypeMismatch {
                    key: "load_after_days",
                    expected: "an integer",
                })
            }
            (ConfigKey::ListType, ConfigValue::ListType(t)) => values.listtype = Some(t),
            (ConfigKey::ListType, ConfigValue::Text(s)) => values.listtype = Some(s.parse()?),
            (ConfigKey::ListType, _) => {
                return Err(ConfigError::TypeMismatch {
                    key: "listtype",
                    expected: "a list type",
                })
            }
        }
        Ok(())
    }
}
