//! Item rows and item ordering

use super::{apply_positions, fetch_item, fetch_list, item_siblings, PositionTable, Repository};
use crate::database::changelog;
use crate::database::locks::{Scope, ScopeGuard};
use crate::database::models::*;
use crate::error::{AppError, Result};
use crate::ordering::{self, MoveTarget};
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

async fn active_subscription_exists(
    conn: &mut SqliteConnection,
    user_id: &str,
    list_id: &str,
) -> Result<bool> {
    let found: Option<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM subscriptions
        WHERE user_id = ? AND list_id = ? AND trashed_at IS NULL
        "#,
    )
    .bind(user_id)
    .bind(list_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(found.is_some())
}

async fn set_item_trashed(conn: &mut SqliteConnection, id: &str) -> Result<Option<Item>> {
    let now = Utc::now();
    let item = sqlx::query_as::<_, Item>(
        r#"
        UPDATE items SET trashed_at = ?, last_changed = ?
        WHERE id = ? AND trashed_at IS NULL
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(item)
}

impl Repository {
    /// Create an item, appended to its list or inserted at `req.position`
    pub async fn create_item(&self, req: CreateItemRequest) -> Result<Item> {
        let _guard = self.locks.lock(Scope::List(req.list_id.clone())).await;
        let mut tx = self.begin_write().await?;

        let list = fetch_list(&mut tx, &req.list_id)
            .await?
            .filter(|l| !l.is_trashed())
            .ok_or_else(|| AppError::ListNotFound(req.list_id.clone()))?;

        let siblings = item_siblings(&mut tx, &list.id).await?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let at = req.position.unwrap_or(siblings.len());
        let (own, shifted): (Vec<_>, Vec<_>) = ordering::place(&siblings, &id, at)
            .into_iter()
            .partition(|(changed, _)| *changed == id);
        let position = own
            .first()
            .map(|(_, pos)| *pos)
            .unwrap_or(siblings.len() as i64);

        apply_positions(&mut tx, PositionTable::Items, &shifted).await?;

        let item = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (id, list_id, text, url, priority, position, created_at, last_changed)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&list.id)
        .bind(&req.text)
        .bind(&req.url)
        .bind(req.priority)
        .bind(position)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        changelog::append(&mut tx, ContentType::Item, &id, ChangeKind::Add).await?;

        tx.commit().await?;

        tracing::debug!("Created item: {} in list: {} at {}", id, list.id, position);
        Ok(item)
    }

    /// Get an untrashed item by ID
    pub async fn get_item(&self, id: &str) -> Result<Item> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ? AND trashed_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::ItemNotFound(id.to_string()))
    }

    /// Get an item by ID whether trashed or not
    pub async fn find_item(&self, id: &str) -> Result<Option<Item>> {
        let mut conn = self.pool.acquire().await?;
        fetch_item(&mut conn, id).await
    }

    /// Untrashed items of a list in position order
    pub async fn list_items(&self, list_id: &str) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT * FROM items
            WHERE list_id = ? AND trashed_at IS NULL
            ORDER BY position ASC
            "#,
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// All items of a list, trashed included, in position order
    pub async fn all_items(&self, list_id: &str) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            "SELECT * FROM items WHERE list_id = ? ORDER BY position ASC",
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Trashed items on lists the user actively subscribes to, most recent first
    pub async fn trashed_items_for(&self, user_id: &str) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT i.* FROM items i
            JOIN subscriptions s ON s.list_id = i.list_id
            WHERE s.user_id = ? AND s.trashed_at IS NULL AND i.trashed_at IS NOT NULL
            ORDER BY i.trashed_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Whether the user holds an untrashed subscription to `list_id`
    pub async fn is_subscribed(&self, user_id: &str, list_id: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        active_subscription_exists(&mut conn, user_id, list_id).await
    }

    /// Update text, url or priority. A request that changes nothing writes nothing.
    pub async fn update_item(&self, req: UpdateItemRequest) -> Result<Item> {
        let mut tx = self.begin_write().await?;

        let item = fetch_item(&mut tx, &req.id)
            .await?
            .filter(|i| !i.is_trashed())
            .ok_or_else(|| AppError::ItemNotFound(req.id.clone()))?;

        let text = req.text.unwrap_or_else(|| item.text.clone());
        let url = req.url.unwrap_or_else(|| item.url.clone());
        let priority = req.priority.unwrap_or(item.priority);

        if text == item.text && url == item.url && priority == item.priority {
            return Ok(item);
        }

        let item = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items SET text = ?, url = ?, priority = ?, last_changed = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&text)
        .bind(&url)
        .bind(priority)
        .bind(Utc::now())
        .bind(&req.id)
        .fetch_one(&mut *tx)
        .await?;
        changelog::append(&mut tx, ContentType::Item, &req.id, ChangeKind::Update).await?;

        tx.commit().await?;

        tracing::debug!("Updated item: {}", req.id);
        Ok(item)
    }

    /// Soft delete an item
    pub async fn trash_item(&self, id: &str) -> Result<Item> {
        let mut tx = self.begin_write().await?;

        let item = set_item_trashed(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::ItemNotFound(id.to_string()))?;
        changelog::append(&mut tx, ContentType::Item, id, ChangeKind::Delete).await?;

        tx.commit().await?;

        tracing::debug!("Soft deleted item: {}", id);
        Ok(item)
    }

    /// Trash several items for `user_id` in one transaction.
    ///
    /// Every id must name an item on a list the user subscribes to, or
    /// nothing is trashed. Items already in the trash are skipped. Returns
    /// the items trashed by this call.
    pub async fn trash_items(&self, user_id: &str, ids: &[String]) -> Result<Vec<Item>> {
        let mut tx = self.begin_write().await?;
        let mut trashed = Vec::new();

        for id in ids {
            let item = fetch_item(&mut tx, id)
                .await?
                .ok_or_else(|| AppError::ItemNotFound(id.clone()))?;

            if !active_subscription_exists(&mut tx, user_id, &item.list_id).await? {
                return Err(AppError::ItemNotFound(id.clone()));
            }

            if item.is_trashed() {
                continue;
            }

            if let Some(item) = set_item_trashed(&mut tx, id).await? {
                changelog::append(&mut tx, ContentType::Item, id, ChangeKind::Delete).await?;
                trashed.push(item);
            }
        }

        tx.commit().await?;

        tracing::debug!("Soft deleted {} of {} items", trashed.len(), ids.len());
        Ok(trashed)
    }

    /// Restore a trashed item
    pub async fn restore_item(&self, id: &str) -> Result<Item> {
        let mut tx = self.begin_write().await?;

        let item = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items SET trashed_at = NULL, last_changed = ?
            WHERE id = ? AND trashed_at IS NOT NULL
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::ItemNotFound(id.to_string()))?;
        changelog::append(&mut tx, ContentType::Item, id, ChangeKind::Undelete).await?;

        tx.commit().await?;

        tracing::debug!("Restored item: {}", id);
        Ok(item)
    }

    /// Lock the scopes a move of item `id` touches.
    ///
    /// The item's list is re-read after locking; if another move changed it
    /// in between, the locks are dropped and taken again.
    async fn lock_item_scopes(
        &self,
        id: &str,
        to_list: Option<&str>,
    ) -> Result<(ScopeGuard, String)> {
        loop {
            let current = self.get_item(id).await?;

            let mut scopes = vec![Scope::List(current.list_id.clone())];
            if let Some(destination) = to_list {
                scopes.push(Scope::List(destination.to_string()));
            }
            let guard = self.locks.lock_all(scopes).await;

            let latest = self.get_item(id).await?;
            if latest.list_id == current.list_id {
                return Ok((guard, latest.list_id));
            }
        }
    }

    /// Move an item within its list, or into `to_list` at an absolute rank.
    pub async fn move_item(
        &self,
        id: &str,
        target: MoveTarget,
        to_list: Option<&str>,
    ) -> Result<Item> {
        if to_list.is_some() && target.is_relative() {
            return Err(AppError::InvalidScope(
                "up/down cannot be combined with a target list".to_string(),
            ));
        }

        let (_guard, source) = self.lock_item_scopes(id, to_list).await?;
        let destination = to_list.unwrap_or(&source).to_string();

        let mut tx = self.begin_write().await?;

        let changes = if destination == source {
            let siblings = item_siblings(&mut tx, &source).await?;
            let to = ordering::resolve_target(&siblings, id, target)?;
            ordering::place(&siblings, id, to)
        } else {
            let MoveTarget::Position(rank) = target else {
                return Err(AppError::InvalidScope(format!(
                    "moving into list {} needs an absolute position",
                    destination
                )));
            };

            fetch_list(&mut tx, &destination)
                .await?
                .filter(|l| !l.is_trashed())
                .ok_or_else(|| {
                    AppError::InvalidScope(format!("list {} does not exist", destination))
                })?;

            let old_scope = item_siblings(&mut tx, &source).await?;
            apply_positions(&mut tx, PositionTable::Items, &ordering::close_gap(&old_scope, id))
                .await?;

            let new_scope = item_siblings(&mut tx, &destination).await?;
            ordering::place(&new_scope, id, rank)
        };

        apply_positions(&mut tx, PositionTable::Items, &changes).await?;

        let item = sqlx::query_as::<_, Item>(
            "UPDATE items SET list_id = ?, last_changed = ? WHERE id = ? RETURNING *",
        )
        .bind(&destination)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        changelog::append(&mut tx, ContentType::Item, id, ChangeKind::Update).await?;

        tx.commit().await?;

        tracing::debug!(
            "Moved item {} to position {} in list {}",
            id,
            item.position,
            item.list_id
        );
        Ok(item)
    }
}
