//! Store Configuration
//!
//! ## StoreConfig
//!
//! - **database_url**: `sqlite://<file>`, `sqlite::memory:` or, with the
//!   `postgres` feature, `postgres://...` (default: `sqlite://forumdb.db`)
//! - **max_connections**: pool size (default: 10, forced to 1 for in-memory
//!   SQLite)
//! - **busy_timeout_ms**: how long a SQLite writer waits for the database lock
//!   (default: 5000)
//! - **default_page_size**: limit used by callers that do not pass one
//!   (default: 100)
//!
//! ## Usage
//!
//! ```ignore
//! use forumdb_store::{connect, StoreConfig};
//!
//! let config = StoreConfig {
//!     database_url: "sqlite:///var/lib/forumdb/forum.db".to_string(),
//!     ..Default::default()
//! };
//! let store = connect(&config).await?;
//! ```

use crate::error::{ForumError, Result};
use crate::pagination::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend connection URL; the scheme picks the backend
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Pool size (default: 10)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// SQLite lock wait in milliseconds (default: 5s)
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Page size when none is requested (default: 100)
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            default_page_size: default_page_size(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://forumdb.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl StoreConfig {
    /// Config pointing at `url`, everything else default.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            database_url: url.into(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: StoreConfig =
            toml::from_str(contents).map_err(|e| ForumError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ForumError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(ForumError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.default_page_size == 0 {
            return Err(ForumError::Config(
                "default_page_size must be at least 1".to_string(),
            ));
        }
        if !self.is_sqlite() && !self.is_postgres() {
            return Err(ForumError::Config(format!(
                "unsupported database url: {}",
                self.database_url
            )));
        }
        Ok(())
    }

    pub fn is_sqlite(&self) -> bool {
        self.database_url.starts_with("sqlite:")
    }

    pub fn is_postgres(&self) -> bool {
        self.database_url.starts_with("postgres://")
            || self.database_url.starts_with("postgresql://")
    }

    pub fn is_in_memory(&self) -> bool {
        self.is_sqlite() && self.database_url.contains(":memory:")
    }
}
