//! Application configuration
//!
//! An optional `config.toml` controls where the database lives and the
//! rate table applied to newly enrolled organizations. A missing file
//! means platform defaults.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::models::RateTable;
use crate::storage::Database;

const QUALIFIER: &str = "";
const ORG: &str = "";
const APP: &str = "tiffin";

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not resolve a platform application directory")]
    NoProjectDirs,
}

/// Application configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Overrides the platform-default database location
    pub database_path: Option<PathBuf>,
    /// Rate table applied to newly enrolled organizations
    pub default_rates: RateTable,
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Load from the platform config location; a missing file yields defaults
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Platform location of `config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from(QUALIFIER, ORG, APP).ok_or(ConfigError::NoProjectDirs)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Where the database lives: the configured override, or the platform data dir
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let dirs = ProjectDirs::from(QUALIFIER, ORG, APP).ok_or(ConfigError::NoProjectDirs)?;
        Ok(dirs.data_dir().join("tiffin.db"))
    }

    /// Open the configured database, creating its directory if needed
    pub fn open_database(&self) -> crate::error::Result<Database> {
        let path = self.database_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Database::open(path)
    }
}
