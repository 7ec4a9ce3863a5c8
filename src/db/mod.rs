//! Persistent metadata cache backed by SQLite.
//!
//! One table maps a relative file path to the tags and cover reference
//! last resolved for it, plus the write timestamp used for freshness
//! decisions. Records are replaced wholesale; there are no field-level
//! updates, so a crashing worker can never leave a half-written record.
//!
//! Schema evolution is destructive: the current schema version lives in
//! SQLite's `user_version` pragma, and an older stored version drops the
//! table instead of migrating it - the cache is repopulated on demand.
//!
//! The store is shared between worker threads and, in deployments that
//! run several server processes against one cache file, between
//! processes. SQLite's own file locking serializes writers; WAL mode and
//! a busy timeout keep readers from blocking on the write window.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::tags::Tags;

/// Bump to discard cached data with an incompatible shape.
pub const CACHE_SCHEMA_VERSION: i32 = 1;

/// A persisted resolution result for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRecord {
    /// Relative path, primary key
    pub path: String,
    /// Write timestamp (unix seconds); `None` only on records built in
    /// memory before their first write
    pub mtime: Option<i64>,
    /// Stored cover asset filename; empty = no real cover was found
    pub cover_filename: String,
    pub tags: Tags,
}

/// Open the cache database and prepare the schema.
///
/// Creates the file if needed, recreates the table when the stored
/// schema version is older than [`CACHE_SCHEMA_VERSION`].
pub async fn init_cache(path: &Path) -> crate::error::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    let version: i32 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&pool)
        .await?;
    if version < CACHE_SCHEMA_VERSION {
        info!(target: "cache", stored = version, current = CACHE_SCHEMA_VERSION, "outdated cache schema, recreating");
        sqlx::query("DROP TABLE IF EXISTS audio_files")
            .execute(&pool)
            .await?;
        sqlx::query(&format!("PRAGMA user_version = {CACHE_SCHEMA_VERSION}"))
            .execute(&pool)
            .await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audio_files (
            path TEXT PRIMARY KEY NOT NULL,
            mtime INTEGER DEFAULT (unixepoch()) NOT NULL,
            cover_filename TEXT NOT NULL,
            artist TEXT NOT NULL,
            title TEXT NOT NULL,
            album TEXT NOT NULL,
            date TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

/// Fetch the cached record for a path.
pub async fn get_record(pool: &SqlitePool, path: &str) -> sqlx::Result<Option<CachedRecord>> {
    let row: Option<(String, i64, String, String, String, String, String)> = sqlx::query_as(
        r#"
        SELECT path, mtime, cover_filename, artist, title, album, date
        FROM audio_files
        WHERE path = ?
        "#,
    )
    .bind(path)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(path, mtime, cover_filename, artist, title, album, date)| CachedRecord {
            path,
            mtime: Some(mtime),
            cover_filename,
            tags: Tags {
                artist,
                title,
                album,
                date,
            },
        },
    ))
}

/// Insert or replace the record for a path.
///
/// Always writes the complete record; `mtime` is stamped by the table
/// default at write time, so a replaced record's freshness clock resets.
pub async fn put_record(pool: &SqlitePool, record: &CachedRecord) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO audio_files
            (path, cover_filename, artist, title, album, date)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.path)
    .bind(&record.cover_filename)
    .bind(&record.tags.artist)
    .bind(&record.tags.title)
    .bind(&record.tags.album)
    .bind(&record.tags.date)
    .execute(pool)
    .await?;
    Ok(())
}
