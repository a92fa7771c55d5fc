//! Database access layer for ibsync-server
//!
//! Tables:
//! - `grid_cells`: one row per non-blank cell, keyed by (date, row, column)
//! - `staff`: staff column headers by 1-based position
//! - `residents`: registry entries as JSON bodies
//! - `sync_meta`: last save time per dataset

use chrono::{DateTime, Utc};
use ibsync_common::time::{now, parse_iso, to_iso};
use ibsync_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;
use std::str::FromStr;

pub mod grid;
pub mod residents;
pub mod staff;

/// Open (creating if missing) the store database and ensure the schema
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    let db_url = format!("sqlite://{}", db_path.display());
    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Create tables if they do not exist
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS grid_cells (
            assignment_date TEXT NOT NULL,
            row_number INTEGER NOT NULL,
            column_number INTEGER NOT NULL,
            resident_name TEXT NOT NULL DEFAULT '',
            color_status TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (assignment_date, row_number, column_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staff (
            position INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS residents (
            id TEXT PRIMARY KEY,
            ordinal INTEGER NOT NULL,
            body TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_meta (
            dataset TEXT PRIMARY KEY,
            saved_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::debug!("Schema initialized");
    Ok(())
}

/// Record a save of `dataset` at the current time
///
/// Takes a connection so the stamp commits with the rows it describes.
pub async fn touch_saved_at(conn: &mut SqliteConnection, dataset: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_meta (dataset, saved_at) VALUES (?, ?)
        ON CONFLICT(dataset) DO UPDATE SET saved_at = excluded.saved_at
        "#,
    )
    .bind(dataset)
    .bind(to_iso(now()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Last save time of `dataset`
pub async fn saved_at(pool: &SqlitePool, dataset: &str) -> Result<Option<DateTime<Utc>>> {
    let row = sqlx::query("SELECT saved_at FROM sync_meta WHERE dataset = ?")
        .bind(dataset)
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|row| {
        let raw: String = row.get("saved_at");
        parse_iso(&raw)
    }))
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    init_schema(&pool).await.expect("Schema initialization failed");
    pool
}
