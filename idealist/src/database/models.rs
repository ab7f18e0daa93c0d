//! Database models
//!
//! Rust structs representing database entities.
//! All models use serde for serialization to the CRUD layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Opaque user identifier issued by the external auth layer
pub type UserId = String;

/// Item priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

/// A named list of items owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct List {
    pub id: String,
    pub name: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub trashed_at: Option<DateTime<Utc>>,
}

/// An entry on a list, ordered by `position` within that list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: String,
    pub list_id: String,
    pub text: String,
    pub url: String,
    pub priority: Priority,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub last_changed: DateTime<Utc>,
    pub trashed_at: Option<DateTime<Utc>>,
}

/// A user's subscription to a list, ordered by `position` within that user's set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: String,
    pub user_id: UserId,
    pub list_id: String,
    pub minimized: bool,
    pub position: i64,
    pub trashed_at: Option<DateTime<Utc>>,
}

impl List {
    pub fn is_trashed(&self) -> bool {
        self.trashed_at.is_some()
    }
}

impl Item {
    pub fn is_trashed(&self) -> bool {
        self.trashed_at.is_some()
    }
}

impl Subscription {
    pub fn is_trashed(&self) -> bool {
        self.trashed_at.is_some()
    }
}

/// Kind of entity a log entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    List,
    Item,
    Subscription,
}

/// What happened to the referenced entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
    Undelete,
}

/// One recorded change. Append-only, ordered by `(time, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LogEntry {
    pub id: i64,
    pub content_type: ContentType,
    pub object_id: String,
    pub change_kind: ChangeKind,
    pub time: DateTime<Utc>,
}

/// Create list request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateListRequest {
    pub owner_id: UserId,
    pub name: String,
    /// Also subscribe the owner to the new list
    #[serde(default)]
    pub subscribe: bool,
}

/// Create item request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateItemRequest {
    pub list_id: String,
    pub text: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub priority: Priority,
    /// Rank to insert at; appended when absent
    #[serde(default)]
    pub position: Option<usize>,
}

/// Update item request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateItemRequest {
    pub id: String,
    pub text: Option<String>,
    pub url: Option<String>,
    pub priority: Option<Priority>,
}

/// A freshly created list, plus the owner's subscription when one was requested
#[derive(Debug, Clone, Serialize)]
pub struct NewList {
    pub list: List,
    pub subscription: Option<Subscription>,
}

/// Result of a subscribe call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeOutcome {
    Created,
    Restored,
    AlreadySubscribed,
}
