//! Metadata overlay repository
//!
//! Keyed long/string side-table for attributes outside the core schema.
//! Hash-addressed entities lean on it heavily (content hash, file index and
//! live flag are mirrored here for consumers that only speak keys).
//!
//! Absent keys read as defaults (`0` / `None`), never as errors. Writes for
//! a transient id (`0`) are refused with `false`. Concurrent writers to the
//! same `(id, key)` race last-write-wins; this layer adds no ordering.

use crate::error::Result;
use crate::models::MediaId;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Well-known overlay keys.
pub mod meta_keys {
    /// Mirrors the entity's content hash (string).
    pub const CONTENT_HASH: &str = "content_hash";
    /// Mirrors the entity's file index within its bundle (long).
    pub const FILE_INDEX: &str = "file_index";
    /// Mirrors the live tri-state in its raw encoding (long).
    pub const IS_LIVE: &str = "is_live";
}

/// Overlay metadata access.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Integer value for `(id, key)`, `0` when absent or `id` is transient.
    async fn get_long(&self, id: MediaId, key: &str) -> Result<i64>;

    /// String value for `(id, key)`, `None` when absent or `id` is transient.
    async fn get_string(&self, id: MediaId, key: &str) -> Result<Option<String>>;

    /// Stores an integer value. Returns `false` for a transient id.
    async fn set_long(&self, id: MediaId, key: &str, value: i64) -> Result<bool>;

    /// Stores a string value. Returns `false` for a transient id.
    async fn set_string(&self, id: MediaId, key: &str, value: &str) -> Result<bool>;

    /// Copies every overlay entry of `source` onto `dest`, replacing
    /// existing keys. Returns `false` when either id is transient.
    async fn copy_all(&self, source: MediaId, dest: MediaId) -> Result<bool>;
}

/// SQLite implementation of [`MetadataRepository`].
pub struct SqliteMetadataRepository {
    pool: SqlitePool,
}

impl SqliteMetadataRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataRepository for SqliteMetadataRepository {
    async fn get_long(&self, id: MediaId, key: &str) -> Result<i64> {
        if id.is_transient() {
            return Ok(0);
        }
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT int_value FROM media_meta WHERE media_id = ? AND key = ?")
                .bind(id.0)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(v,)| v).unwrap_or(0))
    }

    async fn get_string(&self, id: MediaId, key: &str) -> Result<Option<String>> {
        if id.is_transient() {
            return Ok(None);
        }
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT str_value FROM media_meta WHERE media_id = ? AND key = ?")
                .bind(id.0)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(v,)| v))
    }

    async fn set_long(&self, id: MediaId, key: &str, value: i64) -> Result<bool> {
        if id.is_transient() {
            return Ok(false);
        }
        sqlx::query(
            r#"
            INSERT INTO media_meta (media_id, key, int_value, str_value)
            VALUES (?, ?, ?, NULL)
            ON CONFLICT (media_id, key) DO UPDATE SET
                int_value = excluded.int_value,
                str_value = excluded.str_value
            "#,
        )
        .bind(id.0)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    async fn set_string(&self, id: MediaId, key: &str, value: &str) -> Result<bool> {
        if id.is_transient() {
            return Ok(false);
        }
        sqlx::query(
            r#"
            INSERT INTO media_meta (media_id, key, int_value, str_value)
            VALUES (?, ?, NULL, ?)
            ON CONFLICT (media_id, key) DO UPDATE SET
                int_value = excluded.int_value,
                str_value = excluded.str_value
            "#,
        )
        .bind(id.0)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    async fn copy_all(&self, source: MediaId, dest: MediaId) -> Result<bool> {
        if source.is_transient() || dest.is_transient() {
            return Ok(false);
        }
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO media_meta (media_id, key, int_value, str_value)
            SELECT ?, key, int_value, str_value FROM media_meta WHERE media_id = ?
            "#,
        )
        .bind(dest.0)
        .bind(source.0)
        .execute(&self.pool)
        .await?;
        Ok(true)
    }
}
