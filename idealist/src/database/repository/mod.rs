//! Repository layer for database operations
//!
//! Every mutation runs in one transaction together with its change-log
//! entry. Position rewrites additionally hold the lock of their scope.

mod items;
mod lists;
mod subscriptions;

use super::changelog;
use super::locks::ScopeLocks;
use super::models::*;
use crate::error::Result;
use crate::ordering::Sibling;
use crate::sync::Snapshot;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::collections::BTreeSet;

/// SQLite's bound-parameter limit is far above this; it just keeps statements small.
const IN_CLAUSE_CHUNK: usize = 500;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    locks: ScopeLocks,
}

/// Tables that carry a `position` column
#[derive(Debug, Clone, Copy)]
enum PositionTable {
    Items,
    Subscriptions,
}

impl PositionTable {
    fn update_sql(self) -> &'static str {
        match self {
            PositionTable::Items => "UPDATE items SET position = ? WHERE id = ?",
            PositionTable::Subscriptions => "UPDATE subscriptions SET position = ? WHERE id = ?",
        }
    }
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: ScopeLocks::new(),
        }
    }

    /// Open a write transaction that takes SQLite's write lock up front.
    ///
    /// A deferred transaction that reads first can't be upgraded once another
    /// connection has committed, and that failure bypasses the busy timeout.
    /// Taking the lock immediately also makes log entries commit in time order.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Log entries strictly newer than `since`, oldest first
    pub async fn log_since(&self, since: DateTime<Utc>) -> Result<Vec<LogEntry>> {
        changelog::newer_than(&self.pool, since).await
    }

    pub async fn log_for(
        &self,
        content_type: ContentType,
        object_id: &str,
    ) -> Result<Vec<LogEntry>> {
        changelog::for_object(&self.pool, content_type, object_id).await
    }

    pub async fn log_count(&self) -> Result<i64> {
        changelog::count(&self.pool).await
    }

    /// Load every row instruction derivation for `user_id` may touch.
    ///
    /// That is the entities referenced by `entries`, the lists they belong
    /// to, all of the user's subscriptions and the active items of every
    /// list a subscription view could embed.
    pub async fn snapshot_for(&self, entries: &[LogEntry], user_id: &str) -> Result<Snapshot> {
        let mut list_ids = BTreeSet::new();
        let mut item_ids = BTreeSet::new();
        let mut subscription_ids = BTreeSet::new();

        for entry in entries {
            let bucket = match entry.content_type {
                ContentType::List => &mut list_ids,
                ContentType::Item => &mut item_ids,
                ContentType::Subscription => &mut subscription_ids,
            };
            bucket.insert(entry.object_id.clone());
        }

        let mut subscriptions: Vec<Subscription> = self
            .fetch_in("SELECT * FROM subscriptions WHERE id IN (", &subscription_ids)
            .await?;
        subscriptions.extend(
            sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?,
        );

        let mut items: Vec<Item> = self
            .fetch_in("SELECT * FROM items WHERE id IN (", &item_ids)
            .await?;

        list_ids.extend(items.iter().map(|i| i.list_id.clone()));
        list_ids.extend(subscriptions.iter().map(|s| s.list_id.clone()));
        let lists: Vec<List> = self
            .fetch_in("SELECT * FROM lists WHERE id IN (", &list_ids)
            .await?;

        let embedded: BTreeSet<String> = subscriptions.iter().map(|s| s.list_id.clone()).collect();
        items.extend(
            self.fetch_in::<Item>(
                "SELECT * FROM items WHERE trashed_at IS NULL AND list_id IN (",
                &embedded,
            )
            .await?,
        );

        Ok(Snapshot::new(lists, items, subscriptions))
    }

    /// Run `prefix` followed by a bound `IN (...)` list over `ids`
    async fn fetch_in<T>(&self, prefix: &str, ids: &BTreeSet<String>) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let ids: Vec<&String> = ids.iter().collect();
        let mut rows = Vec::new();

        for chunk in ids.chunks(IN_CLAUSE_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(prefix);
            let mut separated = qb.separated(", ");
            for id in chunk {
                separated.push_bind((*id).clone());
            }
            separated.push_unseparated(")");

            rows.extend(qb.build_query_as::<T>().fetch_all(&self.pool).await?);
        }

        Ok(rows)
    }
}

/// Write `(id, position)` pairs produced by [`crate::ordering`]
async fn apply_positions(
    conn: &mut SqliteConnection,
    table: PositionTable,
    changes: &[(String, i64)],
) -> Result<()> {
    for (id, position) in changes {
        sqlx::query(table.update_sql())
            .bind(position)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }

    if !changes.is_empty() {
        tracing::debug!("Rewrote {} positions in {:?}", changes.len(), table);
    }
    Ok(())
}

/// Items of a list, trashed included, in rank order
async fn item_siblings(conn: &mut SqliteConnection, list_id: &str) -> Result<Vec<Sibling>> {
    let rows: Vec<(String, i64, bool)> = sqlx::query_as(
        r#"
        SELECT id, position, trashed_at IS NULL
        FROM items
        WHERE list_id = ?
        ORDER BY position, id
        "#,
    )
    .bind(list_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, position, active)| Sibling::new(id, position, active))
        .collect())
}

/// Subscriptions of a user in rank order.
///
/// A subscription only counts as an up/down neighbour while both it and its
/// list are untrashed.
async fn subscription_siblings(conn: &mut SqliteConnection, user_id: &str) -> Result<Vec<Sibling>> {
    let rows: Vec<(String, i64, bool)> = sqlx::query_as(
        r#"
        SELECT s.id, s.position, (s.trashed_at IS NULL AND l.trashed_at IS NULL)
        FROM subscriptions s
        JOIN lists l ON l.id = s.list_id
        WHERE s.user_id = ?
        ORDER BY s.position, s.id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, position, active)| Sibling::new(id, position, active))
        .collect())
}

async fn fetch_list(conn: &mut SqliteConnection, id: &str) -> Result<Option<List>> {
    let list = sqlx::query_as::<_, List>("SELECT * FROM lists WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(list)
}

async fn fetch_item(conn: &mut SqliteConnection, id: &str) -> Result<Option<Item>> {
    let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(item)
}

async fn fetch_subscription(conn: &mut SqliteConnection, id: &str) -> Result<Option<Subscription>> {
    let subscription = sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(subscription)
}

#[cfg(test)]
pub(crate) async fn create_test_repo() -> Repository {
    Repository::new(crate::database::memory_pool().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::EntityLookup;

    #[tokio::test]
    async fn test_snapshot_covers_referenced_rows() {
        let repo = create_test_repo().await;
        let since = Utc::now() - chrono::Duration::seconds(1);

        let created = repo
            .create_list(CreateListRequest {
                owner_id: "u1".into(),
                name: "Groceries".into(),
                subscribe: true,
            })
            .await
            .unwrap();
        let item = repo
            .create_item(CreateItemRequest {
                list_id: created.list.id.clone(),
                text: "milk".into(),
                url: String::new(),
                priority: Priority::Normal,
                position: None,
            })
            .await
            .unwrap();

        let entries = repo.log_since(since).await.unwrap();
        assert_eq!(entries.len(), 3);

        let snapshot = repo.snapshot_for(&entries, "u1").await.unwrap();
        assert!(snapshot.list(&created.list.id).is_some());
        assert!(snapshot.item(&item.id).is_some());
        assert!(snapshot
            .subscription_for(&created.list.id, "u1")
            .is_some());
        assert_eq!(snapshot.active_items(&created.list.id).len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_of_empty_log() {
        let repo = create_test_repo().await;
        let snapshot = repo.snapshot_for(&[], "nobody").await.unwrap();
        assert!(snapshot.list("anything").is_none());
    }
}
