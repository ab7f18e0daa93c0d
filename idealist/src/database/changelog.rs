//! Change log storage
//!
//! Mutations call [`append`] on the same connection (usually an open
//! transaction) that carries the change itself, passing the kind of change
//! explicitly. Entry times strictly increase with the entry id, so a reader
//! that saw everything up to `t` can resume with `time > t`.

use super::models::{ChangeKind, ContentType, LogEntry};
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::{SqliteConnection, SqlitePool};

/// Append one entry for a change to `content_type` / `object_id`.
pub async fn append(
    conn: &mut SqliteConnection,
    content_type: ContentType,
    object_id: &str,
    change_kind: ChangeKind,
) -> Result<LogEntry> {
    let previous: Option<DateTime<Utc>> =
        sqlx::query_scalar("SELECT time FROM log_entries ORDER BY id DESC LIMIT 1")
            .fetch_optional(&mut *conn)
            .await?;

    let now = Utc::now();
    let time = match previous {
        Some(prev) if prev >= now => prev + Duration::nanoseconds(1),
        _ => now,
    };

    let entry = sqlx::query_as::<_, LogEntry>(
        r#"
        INSERT INTO log_entries (content_type, object_id, change_kind, time)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(content_type)
    .bind(object_id)
    .bind(change_kind)
    .bind(time)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!(
        "Logged {:?} {:?} {} as entry {}",
        change_kind,
        content_type,
        object_id,
        entry.id
    );
    Ok(entry)
}

/// Entries strictly newer than `since`, oldest first
pub async fn newer_than(pool: &SqlitePool, since: DateTime<Utc>) -> Result<Vec<LogEntry>> {
    let entries = sqlx::query_as::<_, LogEntry>(
        r#"
        SELECT * FROM log_entries
        WHERE time > ?
        ORDER BY time ASC, id ASC
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// All entries for one entity, oldest first
pub async fn for_object(
    pool: &SqlitePool,
    content_type: ContentType,
    object_id: &str,
) -> Result<Vec<LogEntry>> {
    let entries = sqlx::query_as::<_, LogEntry>(
        r#"
        SELECT * FROM log_entries
        WHERE content_type = ? AND object_id = ?
        ORDER BY time ASC, id ASC
        "#,
    )
    .bind(content_type)
    .bind(object_id)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM log_entries")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Convert a unix timestamp in (possibly fractional) seconds.
pub fn from_unix_seconds(secs: f64) -> Result<DateTime<Utc>> {
    if !secs.is_finite() {
        return Err(AppError::Validation(format!("invalid timestamp: {}", secs)));
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1_000_000_000.0).round() as u32;
    Utc.timestamp_opt(whole as i64, nanos.min(999_999_999))
        .single()
        .ok_or_else(|| AppError::Validation(format!("timestamp out of range: {}", secs)))
}
