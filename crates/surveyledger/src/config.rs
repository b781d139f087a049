//! Configuration management for surveyledger.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "surveyledger";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "ledger.db";

/// Storage name of the local append-only submission list.
pub const LOCAL_SUBMISSIONS_NAME: &str = "arta_submissions";

/// Default file name of the device-local survey configuration.
const LOCAL_CONFIG_FILE_NAME: &str = "survey_config.json";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SURVEYLEDGER_`, sections split on `__`)
/// 2. TOML config file at `~/.config/surveyledger/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where submissions go.
    pub backend: BackendConfig,
    /// Ledger database configuration.
    pub storage: StorageConfig,
    /// Device-local store configuration.
    pub local: LocalConfig,
}

/// Which submission sink the coordinator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkMode {
    /// No backend: append to the device-local store without deduplication.
    Local,
    /// Call the transactional ledger.
    #[default]
    Remote,
}

impl fmt::Display for SinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// Backend-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Submission sink.
    pub mode: SinkMode,
    /// How long a remote call may take before it is reported as timed out.
    pub request_timeout_ms: u64,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/surveyledger/ledger.db`
    pub database_path: Option<PathBuf>,
    /// How long a writer waits for a competing transaction, in milliseconds.
    pub busy_timeout_ms: u64,
}

/// Device-local store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Path to the append-only submission list.
    /// Defaults to `~/.local/share/surveyledger/arta_submissions.json`
    pub submissions_path: Option<PathBuf>,
    /// Path to the device-local survey configuration.
    /// Defaults to `~/.local/share/surveyledger/survey_config.json`
    pub config_path: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: SinkMode::default(),
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            busy_timeout_ms: 5_000,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("SURVEYLEDGER_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.backend.request_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "request_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.storage.busy_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "busy_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.local.submissions_path.is_some()
            && self.local.submissions_path == self.local.config_path
        {
            return Err(Error::ConfigValidation {
                message: "local submissions_path and config_path must differ".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the local submission list path, resolving defaults if not set.
    #[must_use]
    pub fn local_submissions_path(&self) -> PathBuf {
        self.local.submissions_path.clone().unwrap_or_else(|| {
            Self::default_data_dir().join(format!("{LOCAL_SUBMISSIONS_NAME}.json"))
        })
    }

    /// Get the device-local survey configuration path, resolving defaults if not set.
    #[must_use]
    pub fn local_config_path(&self) -> PathBuf {
        self.local
            .config_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(LOCAL_CONFIG_FILE_NAME))
    }

    /// Get the remote request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.backend.request_timeout_ms)
    }

    /// Get the database busy timeout as a Duration.
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.busy_timeout_ms)
    }
}
