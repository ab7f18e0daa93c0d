//! Items service
//!
//! Validation, editing and ordering of list items.

use crate::config::MAX_ITEM_TEXT_LENGTH;
use crate::database::{CreateItemRequest, Item, Repository, UpdateItemRequest};
use crate::error::{AppError, Result};
use crate::ordering::MoveTarget;

fn validate_text(text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("empty item text".to_string()));
    }
    if text.chars().count() > MAX_ITEM_TEXT_LENGTH {
        return Err(AppError::Validation(format!(
            "item text longer than {} characters",
            MAX_ITEM_TEXT_LENGTH
        )));
    }
    Ok(text.to_string())
}

fn validate_url(url: &str) -> Result<String> {
    let url = url.trim();
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Err(AppError::Validation(format!("not an http(s) url: {}", url)))
    }
}

/// Service for managing items
#[derive(Clone)]
pub struct ItemsService {
    repo: Repository,
}

impl ItemsService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a new item
    pub async fn create_item(&self, mut req: CreateItemRequest) -> Result<Item> {
        req.text = validate_text(&req.text)?;
        req.url = validate_url(&req.url)?;

        let item = self.repo.create_item(req).await?;
        tracing::info!("Item created successfully: {}", item.id);
        Ok(item)
    }

    pub async fn get_item(&self, id: &str) -> Result<Item> {
        self.repo.get_item(id).await
    }

    /// Untrashed items of a list in display order
    pub async fn list_items(&self, list_id: &str) -> Result<Vec<Item>> {
        self.repo.list_items(list_id).await
    }

    pub async fn update_item(&self, mut req: UpdateItemRequest) -> Result<Item> {
        tracing::debug!("Updating item: {}", req.id);

        req.text = req.text.as_deref().map(validate_text).transpose()?;
        req.url = req.url.as_deref().map(validate_url).transpose()?;

        self.repo.update_item(req).await
    }

    /// Trash an item (soft delete)
    pub async fn trash_item(&self, id: &str) -> Result<Item> {
        tracing::info!("Trashing item: {}", id);
        self.repo.trash_item(id).await
    }

    /// Trash several items at once; any invalid id aborts the whole batch
    pub async fn trash_items(&self, user_id: &str, ids: &[String]) -> Result<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        match self.repo.trash_items(user_id, ids).await {
            Ok(items) => {
                tracing::info!("Items {} removed", ids.join(","));
                Ok(items)
            }
            Err(e) => {
                tracing::warn!("Batch trash by {} rejected: {}", user_id, e);
                Err(e)
            }
        }
    }

    pub async fn restore_item(&self, id: &str) -> Result<Item> {
        tracing::info!("Restoring item: {}", id);
        self.repo.restore_item(id).await
    }

    /// Move an item; `to_list` requires an absolute target
    pub async fn move_item(
        &self,
        id: &str,
        target: MoveTarget,
        to_list: Option<&str>,
    ) -> Result<Item> {
        match self.repo.move_item(id, target, to_list).await {
            Ok(item) => {
                tracing::info!("Item {} moved to index {}", item.id, item.position);
                Ok(item)
            }
            Err(e) => {
                tracing::warn!("Move of item {} ({}) rejected: {}", id, target, e);
                Err(e)
            }
        }
    }
}
