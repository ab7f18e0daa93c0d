//! Error types for the idealist core
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized for the CRUD layer.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a move request was refused without touching any rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveRejection {
    /// Up requested but nothing active sits above
    AtTop,
    /// Down requested but nothing active sits below
    AtBottom,
    /// Absolute target equals the current rank in the same scope
    Unchanged,
}

impl fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveRejection::AtTop => write!(f, "could not raise: was on top"),
            MoveRejection::AtBottom => write!(f, "could not lower: was on bottom"),
            MoveRejection::Unchanged => write!(f, "already at requested position"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("List not found: {0}")]
    ListNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Move rejected: {0}")]
    NoOpMove(MoveRejection),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Subscription {0} belongs to another user")]
    NotSubscriptionOwner(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
