//! List rows

use super::subscriptions::insert_subscription;
use super::{fetch_list, Repository};
use crate::database::changelog;
use crate::database::locks::Scope;
use crate::database::models::*;
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Fail if another list already uses `name`; trashed lists still hold their name
async fn ensure_name_free(
    conn: &mut SqliteConnection,
    name: &str,
    except_id: Option<&str>,
) -> Result<()> {
    let holder: Option<String> = sqlx::query_scalar("SELECT id FROM lists WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    match holder {
        Some(id) if Some(id.as_str()) != except_id => Err(AppError::Validation(format!(
            "list name already taken: {}",
            name
        ))),
        _ => Ok(()),
    }
}

/// Map a UNIQUE violation on `lists.name` to the same error [`ensure_name_free`] gives
fn name_conflict(err: sqlx::Error, name: &str) -> AppError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => {
            AppError::Validation(format!("list name already taken: {}", name))
        }
        _ => AppError::Database(err),
    }
}

impl Repository {
    /// Create a list, optionally subscribing its owner in the same transaction
    pub async fn create_list(&self, req: CreateListRequest) -> Result<NewList> {
        let _guard = if req.subscribe {
            Some(self.locks.lock(Scope::User(req.owner_id.clone())).await)
        } else {
            None
        };

        let mut tx = self.begin_write().await?;
        ensure_name_free(&mut tx, &req.name, None).await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let list = sqlx::query_as::<_, List>(
            r#"
            INSERT INTO lists (id, name, owner_id, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&req.name)
        .bind(&req.owner_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| name_conflict(e, &req.name))?;
        changelog::append(&mut tx, ContentType::List, &list.id, ChangeKind::Add).await?;

        let subscription = if req.subscribe {
            let subscription = insert_subscription(&mut tx, &req.owner_id, &list.id).await?;
            changelog::append(
                &mut tx,
                ContentType::Subscription,
                &subscription.id,
                ChangeKind::Add,
            )
            .await?;
            Some(subscription)
        } else {
            None
        };

        tx.commit().await?;

        tracing::debug!("Created list: {}", id);
        Ok(NewList { list, subscription })
    }

    /// Get an untrashed list by ID
    pub async fn get_list(&self, id: &str) -> Result<List> {
        sqlx::query_as::<_, List>("SELECT * FROM lists WHERE id = ? AND trashed_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::ListNotFound(id.to_string()))
    }

    /// Get a list by ID whether trashed or not
    pub async fn find_list(&self, id: &str) -> Result<Option<List>> {
        let mut conn = self.pool.acquire().await?;
        fetch_list(&mut conn, id).await
    }

    /// All untrashed lists by name
    pub async fn list_lists(&self) -> Result<Vec<List>> {
        let lists = sqlx::query_as::<_, List>(
            r#"
            SELECT * FROM lists
            WHERE trashed_at IS NULL
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(lists)
    }

    /// Trashed lists the user holds any subscription to, most recent first
    pub async fn trashed_lists_for(&self, user_id: &str) -> Result<Vec<List>> {
        let lists = sqlx::query_as::<_, List>(
            r#"
            SELECT l.* FROM lists l
            JOIN subscriptions s ON s.list_id = l.id
            WHERE s.user_id = ? AND l.trashed_at IS NOT NULL
            ORDER BY l.trashed_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lists)
    }

    /// Rename a list. Renaming to the current name changes nothing.
    pub async fn rename_list(&self, id: &str, name: &str) -> Result<List> {
        let mut tx = self.begin_write().await?;

        let list = fetch_list(&mut tx, id)
            .await?
            .filter(|l| !l.is_trashed())
            .ok_or_else(|| AppError::ListNotFound(id.to_string()))?;

        if list.name == name {
            return Ok(list);
        }

        ensure_name_free(&mut tx, name, Some(id)).await?;

        let list = sqlx::query_as::<_, List>("UPDATE lists SET name = ? WHERE id = ? RETURNING *")
            .bind(name)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| name_conflict(e, name))?;
        changelog::append(&mut tx, ContentType::List, id, ChangeKind::Update).await?;

        tx.commit().await?;

        tracing::debug!("Renamed list {} to {}", id, name);
        Ok(list)
    }

    /// Soft delete a list
    pub async fn trash_list(&self, id: &str) -> Result<List> {
        let mut tx = self.begin_write().await?;

        let list = sqlx::query_as::<_, List>(
            r#"
            UPDATE lists SET trashed_at = ? WHERE id = ? AND trashed_at IS NULL
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::ListNotFound(id.to_string()))?;
        changelog::append(&mut tx, ContentType::List, id, ChangeKind::Delete).await?;

        tx.commit().await?;

        tracing::debug!("Soft deleted list: {}", id);
        Ok(list)
    }

    /// Restore a trashed list
    pub async fn restore_list(&self, id: &str) -> Result<List> {
        let mut tx = self.begin_write().await?;

        let list = sqlx::query_as::<_, List>(
            r#"
            UPDATE lists SET trashed_at = NULL WHERE id = ? AND trashed_at IS NOT NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::ListNotFound(id.to_string()))?;
        changelog::append(&mut tx, ContentType::List, id, ChangeKind::Undelete).await?;

        tx.commit().await?;

        tracing::debug!("Restored list: {}", id);
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::super::create_test_repo;
    use super::*;

    fn request(name: &str, subscribe: bool) -> CreateListRequest {
        CreateListRequest {
            owner_id: "u1".to_string(),
            name: name.to_string(),
            subscribe,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_list() {
        let repo = create_test_repo().await;

        let created = repo.create_list(request("List1", false)).await.unwrap();
        assert!(created.subscription.is_none());

        let fetched = repo.get_list(&created.list.id).await.unwrap();
        assert_eq!(fetched.name, "List1");
        assert_eq!(fetched.owner_id, "u1");

        let log = repo.log_for(ContentType::List, &created.list.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].change_kind, ChangeKind::Add);
    }

    #[tokio::test]
    async fn test_name_constraint_maps_to_validation() {
        let repo = create_test_repo().await;
        repo.create_list(request("List1", false)).await.unwrap();

        // Bypasses the pre-check, as a racing writer would
        let err = sqlx::query(
            "INSERT INTO lists (id, name, owner_id, created_at) VALUES ('x', 'List1', 'u2', ?)",
        )
        .bind(Utc::now())
        .execute(&repo.pool)
        .await
        .unwrap_err();
        assert!(matches!(name_conflict(err, "List1"), AppError::Validation(_)));

        let other = sqlx::query("SELECT * FROM no_such_table")
            .execute(&repo.pool)
            .await
            .unwrap_err();
        assert!(matches!(name_conflict(other, "List1"), AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_create_and_subscribe_logs_twice() {
        let repo = create_test_repo().await;

        let created = repo.create_list(request("List1", true)).await.unwrap();
        let subscription = created.subscription.unwrap();

        assert_eq!(subscription.position, 0);
        assert_eq!(repo.log_count().await.unwrap(), 2);
        let log = repo
            .log_for(ContentType::Subscription, &subscription.id)
            .await
            .unwrap();
        assert_eq!(log[0].change_kind, ChangeKind::Add);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected_without_logging() {
        let repo = create_test_repo().await;
        repo.create_list(request("List1", false)).await.unwrap();

        let result = repo.create_list(request("List1", false)).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(repo.log_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rename_list() {
        let repo = create_test_repo().await;
        let list = repo.create_list(request("List1", false)).await.unwrap().list;

        let renamed = repo.rename_list(&list.id, "List2").await.unwrap();
        assert_eq!(renamed.name, "List2");

        let unchanged = repo.rename_list(&list.id, "List2").await.unwrap();
        assert_eq!(unchanged.name, "List2");

        let kinds: Vec<ChangeKind> = repo
            .log_for(ContentType::List, &list.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.change_kind)
            .collect();
        assert_eq!(kinds, vec![ChangeKind::Add, ChangeKind::Update]);
    }

    #[tokio::test]
    async fn test_trash_and_restore_list() {
        let repo = create_test_repo().await;
        let list = repo.create_list(request("List1", true)).await.unwrap().list;

        let trashed = repo.trash_list(&list.id).await.unwrap();
        assert!(trashed.is_trashed());
        assert!(repo.get_list(&list.id).await.is_err());
        assert!(repo.find_list(&list.id).await.unwrap().is_some());
        assert_eq!(repo.list_lists().await.unwrap().len(), 0);
        assert_eq!(repo.trashed_lists_for("u1").await.unwrap().len(), 1);
        assert_eq!(repo.trashed_lists_for("u2").await.unwrap().len(), 0);

        assert!(matches!(
            repo.trash_list(&list.id).await,
            Err(AppError::ListNotFound(_))
        ));

        let restored = repo.restore_list(&list.id).await.unwrap();
        assert!(!restored.is_trashed());

        let kinds: Vec<ChangeKind> = repo
            .log_for(ContentType::List, &list.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.change_kind)
            .collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Add, ChangeKind::Delete, ChangeKind::Undelete]
        );
    }

    #[tokio::test]
    async fn test_restore_untrashed_list_fails() {
        let repo = create_test_repo().await;
        let list = repo.create_list(request("List1", false)).await.unwrap().list;

        assert!(matches!(
            repo.restore_list(&list.id).await,
            Err(AppError::ListNotFound(_))
        ));
    }
}
