//! Configuration management for forumctl
//!
//! ```toml
//! # ~/.forumdb/config.toml
//! [store]
//! database_url = "sqlite:///var/lib/forumdb/forum.db"
//! busy_timeout_ms = 2000
//! ```

use anyhow::{Context, Result};
use forumdb_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Store connection settings
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load config from `path`, or from the default location when no path is
    /// given. A missing default file means default settings; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::config_path(), false),
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!("config file not found: {}", path.display());
            }
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.store.validate()?;
        Ok(config)
    }

    /// Command-line and environment settings win over the file.
    pub fn with_database_url(mut self, database_url: Option<String>) -> Self {
        if let Some(url) = database_url {
            self.store.database_url = url;
        }
        self
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get config file path (~/.forumdb/config.toml)
    fn config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".forumdb").join("config.toml")
    }
}
