//! # Catalog Database Module
//!
//! SQLite connection pooling for the catalog store.
//!
//! The pool runs in WAL mode with foreign keys enforced, applies the
//! embedded migrations on creation and finishes with a health check, so a
//! successfully created pool is ready for repository traffic.

use crate::error::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection pool configuration for the catalog database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// sqlx database URL (`sqlite:<path>` or `sqlite::memory:`).
    pub database_url: String,
    /// Minimum pooled connections.
    pub min_connections: u32,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Maximum wait for a connection from the pool.
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Configuration for a file-backed catalog.
    ///
    /// The special path `:memory:` is routed to [`DatabaseConfig::in_memory`].
    pub fn new(database_path: impl AsRef<Path>) -> Self {
        let path = database_path.as_ref();
        if path.as_os_str() == ":memory:" {
            return Self::in_memory();
        }
        Self {
            database_url: format!("sqlite:{}", path.display()),
            min_connections: 1,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Configuration for an in-memory catalog.
    ///
    /// Pooled in-memory connections each open a distinct database, so the
    /// pool is capped at a single connection to keep migrations visible.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Set the maximum pooled connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Creates the catalog connection pool, runs migrations and verifies the
/// database answers queries.
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    info!(
        database_url = %config.database_url,
        max_connections = config.max_connections,
        "Opening catalog database"
    );

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(LibraryError::Database)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .create_if_missing(true)
        .pragma("cache_size", "-16000");

    let pool = SqlitePoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to open catalog database");
            LibraryError::Database(e)
        })?;

    run_migrations(&pool).await?;
    health_check(&pool).await?;

    Ok(pool)
}

/// In-memory pool with migrations applied, for tests.
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_pool(DatabaseConfig::in_memory()).await
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    debug!("Applying catalog migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Catalog migration failed");
            LibraryError::Migration(e.to_string())
        })?;
    Ok(())
}

async fn health_check(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!(error = %e, "Catalog health check failed");
        LibraryError::Database(e)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_in_memory_pool() {
        let pool = create_test_pool().await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_memory_path_is_routed() {
        let config = DatabaseConfig::new(":memory:");
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_connections, 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let pool = create_test_pool().await.unwrap();

        let result: (i32,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(result.0, 1);
    }

    #[tokio::test]
    async fn test_migrations_create_catalog_tables() {
        let pool = create_test_pool().await.unwrap();

        for table in ["media", "media_meta"] {
            let count: (i32,) = sqlx::query_as(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(count.0, 1, "table {table} should exist");
        }
    }

    #[tokio::test]
    async fn test_hash_uniqueness_index_exists() {
        let pool = create_test_pool().await.unwrap();

        let count: (i32,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_media_hash_file'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count.0, 1);
    }
}
