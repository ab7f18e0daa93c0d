//! Subscription rows and subscription ordering

use super::{
    apply_positions, fetch_list, fetch_subscription, subscription_siblings, PositionTable,
    Repository,
};
use crate::database::changelog;
use crate::database::locks::Scope;
use crate::database::models::*;
use crate::error::{AppError, Result};
use crate::ordering::{self, MoveTarget};
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Insert a subscription at the end of the user's set.
///
/// Callers must hold the user's scope lock and log the change themselves.
pub(super) async fn insert_subscription(
    conn: &mut SqliteConnection,
    user_id: &str,
    list_id: &str,
) -> Result<Subscription> {
    let position: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM subscriptions WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    let subscription = sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (id, user_id, list_id, minimized, position)
        VALUES (?, ?, ?, 0, ?)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(list_id)
    .bind(position)
    .fetch_one(&mut *conn)
    .await?;

    Ok(subscription)
}

/// Load an untrashed subscription and check it belongs to `user_id`
async fn owned_subscription(
    conn: &mut SqliteConnection,
    user_id: &str,
    id: &str,
) -> Result<Subscription> {
    let subscription = fetch_subscription(conn, id)
        .await?
        .filter(|s| !s.is_trashed())
        .ok_or_else(|| AppError::SubscriptionNotFound(id.to_string()))?;

    if subscription.user_id != user_id {
        return Err(AppError::NotSubscriptionOwner(id.to_string()));
    }
    Ok(subscription)
}

impl Repository {
    /// Subscribe a user to a list.
    ///
    /// A trashed subscription for the same pair is restored in place of a
    /// new one.
    pub async fn subscribe(
        &self,
        user_id: &str,
        list_id: &str,
    ) -> Result<(Subscription, SubscribeOutcome)> {
        let _guard = self.locks.lock(Scope::User(user_id.to_string())).await;
        let mut tx = self.begin_write().await?;

        fetch_list(&mut tx, list_id)
            .await?
            .filter(|l| !l.is_trashed())
            .ok_or_else(|| AppError::ListNotFound(list_id.to_string()))?;

        let existing = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE user_id = ? AND list_id = ?",
        )
        .bind(user_id)
        .bind(list_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (subscription, outcome) = match existing {
            Some(s) if !s.is_trashed() => return Ok((s, SubscribeOutcome::AlreadySubscribed)),
            Some(s) => {
                let restored = sqlx::query_as::<_, Subscription>(
                    "UPDATE subscriptions SET trashed_at = NULL WHERE id = ? RETURNING *",
                )
                .bind(&s.id)
                .fetch_one(&mut *tx)
                .await?;
                changelog::append(&mut tx, ContentType::Subscription, &s.id, ChangeKind::Undelete)
                    .await?;
                (restored, SubscribeOutcome::Restored)
            }
            None => {
                let created = insert_subscription(&mut tx, user_id, list_id).await?;
                changelog::append(&mut tx, ContentType::Subscription, &created.id, ChangeKind::Add)
                    .await?;
                (created, SubscribeOutcome::Created)
            }
        };

        tx.commit().await?;

        tracing::debug!(
            "Subscription {} of {} to {}: {:?}",
            subscription.id,
            user_id,
            list_id,
            outcome
        );
        Ok((subscription, outcome))
    }

    /// Trash the user's subscription to a list
    pub async fn unsubscribe(&self, user_id: &str, list_id: &str) -> Result<Subscription> {
        let mut tx = self.begin_write().await?;

        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions SET trashed_at = ?
            WHERE user_id = ? AND list_id = ? AND trashed_at IS NULL
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(user_id)
        .bind(list_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::SubscriptionNotFound(format!("{} on list {}", user_id, list_id))
        })?;
        changelog::append(
            &mut tx,
            ContentType::Subscription,
            &subscription.id,
            ChangeKind::Delete,
        )
        .await?;

        tx.commit().await?;

        tracing::debug!("Soft deleted subscription: {}", subscription.id);
        Ok(subscription)
    }

    /// Get an untrashed subscription by ID
    pub async fn get_subscription(&self, id: &str) -> Result<Subscription> {
        sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE id = ? AND trashed_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::SubscriptionNotFound(id.to_string()))
    }

    /// The user's subscription to a list, trashed or not
    pub async fn subscription_for(
        &self,
        user_id: &str,
        list_id: &str,
    ) -> Result<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE user_id = ? AND list_id = ?",
        )
        .bind(user_id)
        .bind(list_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    /// Untrashed subscriptions to untrashed lists, in the user's order
    pub async fn list_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT s.* FROM subscriptions s
            JOIN lists l ON l.id = s.list_id
            WHERE s.user_id = ? AND s.trashed_at IS NULL AND l.trashed_at IS NULL
            ORDER BY s.position ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    /// All of a user's subscriptions, trashed included, in position order
    pub async fn all_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE user_id = ? ORDER BY position ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    /// Set the minimized flag. Returns whether anything changed.
    pub async fn set_minimized(
        &self,
        user_id: &str,
        id: &str,
        minimized: bool,
    ) -> Result<(Subscription, bool)> {
        let mut tx = self.begin_write().await?;

        let subscription = owned_subscription(&mut tx, user_id, id).await?;
        if subscription.minimized == minimized {
            return Ok((subscription, false));
        }

        let subscription = sqlx::query_as::<_, Subscription>(
            "UPDATE subscriptions SET minimized = ? WHERE id = ? RETURNING *",
        )
        .bind(minimized)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        changelog::append(&mut tx, ContentType::Subscription, id, ChangeKind::Update).await?;

        tx.commit().await?;

        tracing::debug!("Subscription {} minimized = {}", id, minimized);
        Ok((subscription, true))
    }

    /// Move a subscription within its owner's set
    pub async fn move_subscription(
        &self,
        user_id: &str,
        id: &str,
        target: MoveTarget,
    ) -> Result<Subscription> {
        let _guard = self.locks.lock(Scope::User(user_id.to_string())).await;
        let mut tx = self.begin_write().await?;

        owned_subscription(&mut tx, user_id, id).await?;

        let siblings = subscription_siblings(&mut tx, user_id).await?;
        let to = ordering::resolve_target(&siblings, id, target)?;
        apply_positions(
            &mut tx,
            PositionTable::Subscriptions,
            &ordering::place(&siblings, id, to),
        )
        .await?;

        let subscription = fetch_subscription(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::SubscriptionNotFound(id.to_string()))?;
        changelog::append(&mut tx, ContentType::Subscription, id, ChangeKind::Update).await?;

        tx.commit().await?;

        tracing::debug!("Moved subscription {} to position {}", id, subscription.position);
        Ok(subscription)
    }
}
