//! Database schema and migrations
//!
//! Versioned SQL files under `migrations/` are applied in order and recorded
//! in the `migrations` table. A database written by a newer build is refused
//! rather than opened with a schema this build doesn't know.

use crate::error::{AppError, Result};
use sqlx::{sqlite::SqlitePool, Row};

/// Initialize database with schema
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    // WAL lets patch readers run while a mutation holds the write lock
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    // Items and subscriptions reference lists
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    // Create migrations table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current_version: i32 = sqlx::query("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?
        .get(0);

    tracing::info!("Current database version: {}", current_version);

    let known = latest_version();
    if current_version > known {
        return Err(AppError::Config(format!(
            "database schema version {} is newer than supported version {}",
            current_version, known
        )));
    }

    apply_migrations(pool, current_version).await?;

    tracing::info!("Database initialization complete");
    Ok(())
}

async fn apply_migrations(pool: &SqlitePool, current_version: i32) -> Result<()> {
    for (version, sql) in get_migrations() {
        if version <= current_version {
            continue;
        }

        tracing::info!("Applying migration version {}", version);

        // A migration and its record commit together
        let mut tx = pool.begin().await?;

        for statement in statements(sql) {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }

        // Record migration
        sqlx::query("INSERT INTO migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Migration version {} applied successfully", version);
    }

    Ok(())
}

/// Split a migration file into statements, dropping `--` comment lines
fn statements(sql: &str) -> Vec<String> {
    let code: String = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    code.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn get_migrations() -> Vec<(i32, &'static str)> {
    vec![(1, include_str!("migrations/001_initial_schema.sql"))]
}

fn latest_version() -> i32 {
    get_migrations().iter().map(|(v, _)| *v).max().unwrap_or(0)
}
