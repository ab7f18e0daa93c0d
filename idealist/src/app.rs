//! Application state and initialization
//!
//! This module wires the database pool and all services together.

use crate::config::AppConfig;
use crate::database::{self, Repository};
use crate::error::Result;
use crate::services::{
    ItemsService, ListsService, SubscriptionsService, SyncService, TrashService,
};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub data_dir: PathBuf,
    pub repo: Repository,
    pub lists: ListsService,
    pub items: ItemsService,
    pub subscriptions: SubscriptionsService,
    pub sync: SyncService,
    pub trash: TrashService,
}

impl AppState {
    /// Load config from `data_dir`, open the database and build the services
    pub async fn initialize(data_dir: &Path) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("Data directory: {:?}", data_dir);

        tokio::fs::create_dir_all(data_dir).await?;
        let config = AppConfig::load(data_dir).await?;

        let db_path = config.database_path_in(data_dir);
        let pool = database::create_pool_with(&db_path, config.max_connections).await?;

        let state = Self::from_pool(config, data_dir.to_path_buf(), pool);
        tracing::info!("Application initialized successfully");
        Ok(state)
    }

    /// Build the services over an existing pool
    pub fn from_pool(config: AppConfig, data_dir: PathBuf, pool: SqlitePool) -> Self {
        let repo = Repository::new(pool);

        Self {
            config,
            data_dir,
            lists: ListsService::new(repo.clone()),
            items: ItemsService::new(repo.clone()),
            subscriptions: SubscriptionsService::new(repo.clone()),
            sync: SyncService::new(repo.clone()),
            trash: TrashService::new(repo.clone()),
            repo,
        }
    }
}
