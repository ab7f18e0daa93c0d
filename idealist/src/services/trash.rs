//! Trash service
//!
//! What a user can bring back, and the batch undelete that does it.

use crate::database::{Item, List, Repository};
use crate::error::{AppError, Result};
use serde::Serialize;

/// Trashed rows visible to one user
#[derive(Debug, Clone, Serialize)]
pub struct TrashView {
    pub items: Vec<Item>,
    pub lists: Vec<List>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UndeleteSummary {
    pub items_restored: Vec<String>,
    pub lists_restored: Vec<String>,
}

#[derive(Clone)]
pub struct TrashService {
    repo: Repository,
}

impl TrashService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Trashed items on lists the user subscribes to, and trashed lists they
    /// held a subscription to
    pub async fn trashed_for(&self, user_id: &str) -> Result<TrashView> {
        Ok(TrashView {
            items: self.repo.trashed_items_for(user_id).await?,
            lists: self.repo.trashed_lists_for(user_id).await?,
        })
    }

    /// Restore what the user is allowed to restore.
    ///
    /// Ids that are unknown, not trashed, or out of the user's reach are
    /// skipped rather than failing the batch.
    pub async fn undelete(
        &self,
        user_id: &str,
        item_ids: &[String],
        list_ids: &[String],
    ) -> Result<UndeleteSummary> {
        let mut summary = UndeleteSummary::default();

        for id in item_ids {
            let Some(item) = self.repo.find_item(id).await? else {
                continue;
            };
            if !item.is_trashed() || !self.repo.is_subscribed(user_id, &item.list_id).await? {
                continue;
            }
            match self.repo.restore_item(id).await {
                Ok(_) => summary.items_restored.push(id.clone()),
                Err(AppError::ItemNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        for id in list_ids {
            let Some(list) = self.repo.find_list(id).await? else {
                continue;
            };
            if !list.is_trashed() || self.repo.subscription_for(user_id, id).await?.is_none() {
                continue;
            }
            match self.repo.restore_list(id).await {
                Ok(_) => summary.lists_restored.push(id.clone()),
                Err(AppError::ListNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        let skipped = item_ids.len() + list_ids.len()
            - summary.items_restored.len()
            - summary.lists_restored.len();
        if skipped > 0 {
            tracing::warn!("Undelete by {} skipped {} ids", user_id, skipped);
        }
        tracing::info!(
            "Undeleted {} items and {} lists for {}",
            summary.items_restored.len(),
            summary.lists_restored.len(),
            user_id
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::create_test_repo;
    use crate::database::{CreateItemRequest, CreateListRequest, Priority};

    async fn setup() -> (Repository, TrashService, List, Item) {
        let repo = create_test_repo().await;
        let list = repo
            .create_list(CreateListRequest {
                owner_id: "u1".into(),
                name: "List1".into(),
                subscribe: true,
            })
            .await
            .unwrap()
            .list;
        let item = repo
            .create_item(CreateItemRequest {
                list_id: list.id.clone(),
                text: "milk".into(),
                url: String::new(),
                priority: Priority::Normal,
                position: None,
            })
            .await
            .unwrap();
        (repo.clone(), TrashService::new(repo), list, item)
    }

    #[tokio::test]
    async fn test_trashed_for() {
        let (repo, service, list, item) = setup().await;
        repo.trash_item(&item.id).await.unwrap();

        let view = service.trashed_for("u1").await.unwrap();
        assert_eq!(view.items.len(), 1);
        assert!(view.lists.is_empty());

        repo.trash_list(&list.id).await.unwrap();
        let view = service.trashed_for("u1").await.unwrap();
        assert_eq!(view.lists.len(), 1);

        assert!(service.trashed_for("u2").await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_undelete_skips_invalid_ids() {
        let (repo, service, list, item) = setup().await;
        repo.trash_item(&item.id).await.unwrap();
        repo.trash_list(&list.id).await.unwrap();

        let summary = service
            .undelete(
                "u1",
                &[item.id.clone(), "missing".to_string()],
                &[list.id.clone(), "missing".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(summary.items_restored, vec![item.id.clone()]);
        assert_eq!(summary.lists_restored, vec![list.id.clone()]);
        assert!(!repo.get_item(&item.id).await.unwrap().is_trashed());
        assert!(!repo.get_list(&list.id).await.unwrap().is_trashed());
    }

    #[tokio::test]
    async fn test_undelete_requires_subscription() {
        let (repo, service, list, item) = setup().await;
        repo.trash_item(&item.id).await.unwrap();
        repo.trash_list(&list.id).await.unwrap();

        let summary = service
            .undelete("u2", &[item.id.clone()], &[list.id.clone()])
            .await
            .unwrap();

        assert_eq!(summary, UndeleteSummary::default());
        assert!(repo.find_item(&item.id).await.unwrap().unwrap().is_trashed());
    }
}
