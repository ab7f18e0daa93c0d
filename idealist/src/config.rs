//! Configuration constants and the on-disk configuration file
//!
//! Validation boundaries live here as constants. Deployment knobs
//! (database location, pool size, log filter) come from `idealist.json`.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

// ===== Validation Limits =====

/// Maximum length of a list name in characters
pub const MAX_LIST_NAME_LENGTH: usize = 50;

/// Maximum length of an item's text in characters
pub const MAX_ITEM_TEXT_LENGTH: usize = 200;

// ===== Database =====

/// Default file name of the SQLite database
pub const DEFAULT_DATABASE_FILE: &str = "idealist.db";

/// Default upper bound on pooled connections
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// How long a connection waits on a locked database before failing
pub const BUSY_TIMEOUT_SECS: u64 = 5;

// ===== Logging =====

/// Filter used when `RUST_LOG` is unset and the config file names none
pub const DEFAULT_LOG_FILTER: &str = "idealist=debug,info";

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE_NAME: &str = "idealist.json";

/// Deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database file; relative paths resolve against the data directory
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_FILE)
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            max_connections: default_max_connections(),
            log_filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Load `idealist.json` from `data_dir`, writing the defaults if it is missing
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);

        if !path.exists() {
            tracing::info!("Config file not found, writing defaults to {:?}", path);
            let default = AppConfig::default();
            default.save(data_dir).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&path).await?;
        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse {:?}: {}", path, e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save the configuration into `data_dir`
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir).await?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(data_dir.join(CONFIG_FILE_NAME), content).await?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(AppError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Database path resolved against `data_dir`
    pub fn database_path_in(&self, data_dir: &Path) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            data_dir.join(&self.database_path)
        }
    }
}
