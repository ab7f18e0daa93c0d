//! Lists service
//!
//! Validation and lifecycle for lists.

use crate::config::MAX_LIST_NAME_LENGTH;
use crate::database::{CreateListRequest, List, NewList, Repository, UserId};
use crate::error::{AppError, Result};

/// Trimmed, non-empty, bounded list name
pub fn validate_list_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("empty name".to_string()));
    }
    if name.chars().count() > MAX_LIST_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "list name longer than {} characters",
            MAX_LIST_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

/// Service for managing lists
#[derive(Clone)]
pub struct ListsService {
    repo: Repository,
}

impl ListsService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a list, subscribing the owner when `subscribe` is set
    pub async fn create_list(
        &self,
        owner_id: UserId,
        name: &str,
        subscribe: bool,
    ) -> Result<NewList> {
        let name = validate_list_name(name)?;
        tracing::info!("Creating list '{}' for {}", name, owner_id);

        let created = self
            .repo
            .create_list(CreateListRequest {
                owner_id,
                name,
                subscribe,
            })
            .await?;

        tracing::info!(
            "List created successfully: {}{}",
            created.list.id,
            if created.subscription.is_some() { " (subscribed)" } else { "" }
        );
        Ok(created)
    }

    pub async fn get_list(&self, id: &str) -> Result<List> {
        self.repo.get_list(id).await
    }

    pub async fn list_lists(&self) -> Result<Vec<List>> {
        self.repo.list_lists().await
    }

    pub async fn rename_list(&self, id: &str, name: &str) -> Result<List> {
        let name = validate_list_name(name)?;
        tracing::debug!("Renaming list {} to '{}'", id, name);
        self.repo.rename_list(id, &name).await
    }

    /// Trash a list (soft delete)
    pub async fn trash_list(&self, id: &str) -> Result<List> {
        tracing::info!("Trashing list: {}", id);
        let list = self.repo.trash_list(id).await?;
        tracing::info!("List trashed successfully: {}", id);
        Ok(list)
    }

    pub async fn restore_list(&self, id: &str) -> Result<List> {
        tracing::info!("Restoring list: {}", id);
        self.repo.restore_list(id).await
    }
}
