//! Subscriptions service

use crate::database::{Repository, SubscribeOutcome, Subscription};
use crate::error::Result;
use crate::ordering::MoveTarget;

/// Service for managing a user's subscriptions
#[derive(Clone)]
pub struct SubscriptionsService {
    repo: Repository,
}

impl SubscriptionsService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Subscribe, restoring a previously trashed subscription if there is one
    pub async fn subscribe(
        &self,
        user_id: &str,
        list_id: &str,
    ) -> Result<(Subscription, SubscribeOutcome)> {
        let (subscription, outcome) = self.repo.subscribe(user_id, list_id).await?;
        tracing::info!("Subscription {} for {}: {:?}", subscription.id, user_id, outcome);
        Ok((subscription, outcome))
    }

    pub async fn unsubscribe(&self, user_id: &str, list_id: &str) -> Result<Subscription> {
        let subscription = self.repo.unsubscribe(user_id, list_id).await?;
        tracing::info!("Subscription removed: {}", subscription.id);
        Ok(subscription)
    }

    /// Minimize or maximize; returns whether the flag actually changed
    pub async fn set_minimized(
        &self,
        user_id: &str,
        subscription_id: &str,
        minimized: bool,
    ) -> Result<(Subscription, bool)> {
        self.repo.set_minimized(user_id, subscription_id, minimized).await
    }

    pub async fn move_subscription(
        &self,
        user_id: &str,
        subscription_id: &str,
        target: MoveTarget,
    ) -> Result<Subscription> {
        match self
            .repo
            .move_subscription(user_id, subscription_id, target)
            .await
        {
            Ok(subscription) => {
                tracing::info!(
                    "Subscription {} moved to index {}",
                    subscription.id,
                    subscription.position
                );
                Ok(subscription)
            }
            Err(e) => {
                tracing::warn!(
                    "Move of subscription {} ({}) rejected: {}",
                    subscription_id,
                    target,
                    e
                );
                Err(e)
            }
        }
    }

    /// Active subscriptions in the user's order
    pub async fn list_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        self.repo.list_subscriptions(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::create_test_repo;
    use crate::database::CreateListRequest;

    #[tokio::test]
    async fn test_subscribe_cycle() {
        let repo = create_test_repo().await;
        let list = repo
            .create_list(CreateListRequest {
                owner_id: "owner".into(),
                name: "Shared".into(),
                subscribe: false,
            })
            .await
            .unwrap()
            .list;
        let service = SubscriptionsService::new(repo);

        let (_, outcome) = service.subscribe("u2", &list.id).await.unwrap();
        assert_eq!(outcome, SubscribeOutcome::Created);
        assert_eq!(service.list_subscriptions("u2").await.unwrap().len(), 1);

        service.unsubscribe("u2", &list.id).await.unwrap();
        assert!(service.list_subscriptions("u2").await.unwrap().is_empty());

        let (_, outcome) = service.subscribe("u2", &list.id).await.unwrap();
        assert_eq!(outcome, SubscribeOutcome::Restored);
    }
}
