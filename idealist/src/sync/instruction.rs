//! Per-user client instructions
//!
//! [`derive_instruction`] decides, for one log entry and one user, what the
//! client has to apply. It only reads from an [`EntityLookup`] and never
//! fails: anything the user may not see, or anything that can't be
//! resolved, yields `None`.

use crate::database::models::{
    ChangeKind, ContentType, Item, List, LogEntry, Priority, Subscription,
};
use serde::Serialize;
use std::collections::HashMap;

/// Client-side collection an instruction targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionType {
    Item,
    Subscription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Update,
    Remove,
}

impl From<ChangeKind> for Action {
    fn from(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Add | ChangeKind::Undelete => Action::Add,
            ChangeKind::Update => Action::Update,
            ChangeKind::Delete => Action::Remove,
        }
    }
}

/// Item as the client sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    pub id: String,
    pub list_id: String,
    pub text: String,
    pub url: String,
    pub priority: Priority,
    pub position: i64,
}

impl From<&Item> for ItemView {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            list_id: item.list_id.clone(),
            text: item.text.clone(),
            url: item.url.clone(),
            priority: item.priority,
            position: item.position,
        }
    }
}

/// List with its active items, embedded in a subscription
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListView {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub items: Vec<ItemView>,
}

/// List without items, used in the full client state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListSummary {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

impl From<&List> for ListSummary {
    fn from(list: &List) -> Self {
        Self {
            id: list.id.clone(),
            name: list.name.clone(),
            owner_id: list.owner_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionView {
    pub id: String,
    pub user_id: String,
    pub list: ListView,
    pub minimized: bool,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InstructionObject {
    Item(ItemView),
    Subscription(SubscriptionView),
}

/// One change the client has to apply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    pub content_type: InstructionType,
    pub action: Action,
    pub object: InstructionObject,
}

/// Read access to current entity state, trashed rows included
pub trait EntityLookup {
    fn list(&self, id: &str) -> Option<&List>;
    fn item(&self, id: &str) -> Option<&Item>;
    fn subscription(&self, id: &str) -> Option<&Subscription>;
    /// The user's non-trashed subscription to a list
    fn subscription_for(&self, list_id: &str, user_id: &str) -> Option<&Subscription>;
    /// Non-trashed items of a list in position order
    fn active_items(&self, list_id: &str) -> Vec<&Item>;
}

/// In-memory [`EntityLookup`] built from loaded rows
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    lists: HashMap<String, List>,
    items: HashMap<String, Item>,
    subscriptions: HashMap<String, Subscription>,
}

impl Snapshot {
    pub fn new(
        lists: impl IntoIterator<Item = List>,
        items: impl IntoIterator<Item = Item>,
        subscriptions: impl IntoIterator<Item = Subscription>,
    ) -> Self {
        Self {
            lists: lists.into_iter().map(|l| (l.id.clone(), l)).collect(),
            items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
            subscriptions: subscriptions
                .into_iter()
                .map(|s| (s.id.clone(), s))
                .collect(),
        }
    }
}

impl EntityLookup for Snapshot {
    fn list(&self, id: &str) -> Option<&List> {
        self.lists.get(id)
    }

    fn item(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    fn subscription(&self, id: &str) -> Option<&Subscription> {
        self.subscriptions.get(id)
    }

    fn subscription_for(&self, list_id: &str, user_id: &str) -> Option<&Subscription> {
        self.subscriptions
            .values()
            .find(|s| s.list_id == list_id && s.user_id == user_id && !s.is_trashed())
    }

    fn active_items(&self, list_id: &str) -> Vec<&Item> {
        let mut items: Vec<&Item> = self
            .items
            .values()
            .filter(|i| i.list_id == list_id && !i.is_trashed())
            .collect();
        items.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        items
    }
}

/// Build the client view of a subscription, or `None` if its list is unknown
pub fn subscription_view(
    subscription: &Subscription,
    lookup: &impl EntityLookup,
) -> Option<SubscriptionView> {
    let list = lookup.list(&subscription.list_id)?;
    Some(SubscriptionView {
        id: subscription.id.clone(),
        user_id: subscription.user_id.clone(),
        list: ListView {
            id: list.id.clone(),
            name: list.name.clone(),
            owner_id: list.owner_id.clone(),
            items: lookup
                .active_items(&list.id)
                .into_iter()
                .map(ItemView::from)
                .collect(),
        },
        minimized: subscription.minimized,
        position: subscription.position,
    })
}

/// What `user_id` has to apply for `entry`, if anything.
pub fn derive_instruction(
    entry: &LogEntry,
    user_id: &str,
    lookup: &impl EntityLookup,
) -> Option<Instruction> {
    let action = Action::from(entry.change_kind);

    match entry.content_type {
        ContentType::Item => {
            let item = lookup.item(&entry.object_id)?;
            lookup.subscription_for(&item.list_id, user_id)?;
            Some(Instruction {
                content_type: InstructionType::Item,
                action,
                object: InstructionObject::Item(ItemView::from(item)),
            })
        }
        ContentType::List => {
            if entry.change_kind == ChangeKind::Add {
                return None;
            }
            let list = lookup.list(&entry.object_id)?;
            let subscription = lookup.subscription_for(&list.id, user_id)?;
            Some(Instruction {
                content_type: InstructionType::Subscription,
                action,
                object: InstructionObject::Subscription(subscription_view(subscription, lookup)?),
            })
        }
        ContentType::Subscription => {
            let subscription = lookup.subscription(&entry.object_id)?;
            if subscription.user_id != user_id {
                return None;
            }
            Some(Instruction {
                content_type: InstructionType::Subscription,
                action,
                object: InstructionObject::Subscription(subscription_view(subscription, lookup)?),
            })
        }
    }
}
