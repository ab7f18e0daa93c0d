//! Sync service
//!
//! Turns the change log into per-user instructions.

use crate::database::{LogEntry, Repository};
use crate::error::Result;
use crate::sync::{self, Instruction, Patch, UserState};
use chrono::{DateTime, Utc};

#[derive(Clone)]
pub struct SyncService {
    repo: Repository,
}

impl SyncService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// The instruction `user_id` should apply for a single log entry
    pub async fn derive_instruction(
        &self,
        entry: &LogEntry,
        user_id: &str,
    ) -> Result<Option<Instruction>> {
        let snapshot = self
            .repo
            .snapshot_for(std::slice::from_ref(entry), user_id)
            .await?;
        Ok(sync::derive_instruction(entry, user_id, &snapshot))
    }

    /// Everything that changed for `user_id` after `since`
    pub async fn patch_since(&self, since: DateTime<Utc>, user_id: &str) -> Result<Patch> {
        let entries = self.repo.log_since(since).await?;
        let snapshot = self.repo.snapshot_for(&entries, user_id).await?;
        let patch = sync::build_patch(since, &entries, user_id, &snapshot);

        tracing::debug!(
            "Patch for {} since {}: {} of {} entries",
            user_id,
            since,
            patch.instructions.len(),
            entries.len()
        );
        Ok(patch)
    }

    /// Full state: the user's subscriptions with embedded lists plus every active list
    pub async fn state_for(&self, user_id: &str) -> Result<UserState> {
        let subscriptions = self.repo.list_subscriptions(user_id).await?;
        let lists = self.repo.list_lists().await?;
        let snapshot = self.repo.snapshot_for(&[], user_id).await?;

        Ok(UserState::assemble(&subscriptions, &lists, &snapshot))
    }
}
