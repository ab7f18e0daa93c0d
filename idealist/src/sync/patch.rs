//! Incremental sync feed and full client state

use super::instruction::{
    derive_instruction, subscription_view, EntityLookup, Instruction, ListSummary,
    SubscriptionView,
};
use crate::database::models::LogEntry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Instructions for one user covering `(since, until]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patch {
    pub since: DateTime<Utc>,
    /// Time of the newest entry considered; poll again from here
    pub until: DateTime<Utc>,
    pub instructions: Vec<Instruction>,
}

/// Everything the client's main view needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserState {
    pub subscriptions: BTreeMap<String, SubscriptionView>,
    pub lists: BTreeMap<String, ListSummary>,
}

/// Derive the patch for `user_id` from `entries`, which must be sorted by time.
///
/// Entries at or before `since` are ignored.
pub fn build_patch(
    since: DateTime<Utc>,
    entries: &[LogEntry],
    user_id: &str,
    lookup: &impl EntityLookup,
) -> Patch {
    let fresh = entries.iter().filter(|e| e.time > since);

    let until = fresh
        .clone()
        .map(|e| e.time)
        .max()
        .unwrap_or(since);

    let instructions = fresh
        .filter_map(|e| derive_instruction(e, user_id, lookup))
        .collect();

    Patch {
        since,
        until,
        instructions,
    }
}

impl UserState {
    /// Assemble state from a user's active subscriptions and all active lists
    pub fn assemble<'a>(
        subscriptions: impl IntoIterator<Item = &'a crate::database::models::Subscription>,
        lists: impl IntoIterator<Item = &'a crate::database::models::List>,
        lookup: &impl EntityLookup,
    ) -> Self {
        Self {
            subscriptions: subscriptions
                .into_iter()
                .filter_map(|s| subscription_view(s, lookup))
                .map(|view| (view.id.clone(), view))
                .collect(),
            lists: lists
                .into_iter()
                .map(|l| (l.id.clone(), ListSummary::from(l)))
                .collect(),
        }
    }
}
