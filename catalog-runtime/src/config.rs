//! # Catalog Configuration Module
//!
//! Builder-validated configuration for the media catalog core.
//!
//! ## Overview
//!
//! [`CatalogConfig`] holds everything the catalog needs to initialize: the
//! database location, the device storage-mount alias table used by identity
//! resolution, the title-grouping threshold and the notification buffer
//! size. The builder fails fast with actionable messages instead of letting
//! a half-configured catalog limp along.
//!
//! ## Usage
//!
//! ```rust
//! use catalog_runtime::config::CatalogConfig;
//!
//! let config = CatalogConfig::builder()
//!     .database_path("/data/catalog.db")
//!     .min_group_prefix_len(6)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.min_group_prefix_len, 6);
//! ```

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Default minimum shared-prefix length for title grouping.
///
/// `0` disables prefix merging entirely; see the grouping engine docs.
pub const DEFAULT_MIN_GROUP_PREFIX_LEN: usize = 6;

/// Default per-subscriber event buffer size.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Device storage mount alias table.
///
/// Some devices expose the same physical external storage under several
/// mount points (`/storage/sdcard0`, `/mnt/media`, ...). Lookups by `file://`
/// URI would then miss records stored under a sibling alias, so identity
/// resolution rewrites alias-prefixed paths onto the canonical mount and
/// retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageMounts {
    /// Canonical mount point all aliases are rewritten onto.
    pub canonical: PathBuf,
    /// Alternate mount points referring to the same physical storage.
    pub aliases: Vec<PathBuf>,
}

impl StorageMounts {
    /// Creates an alias table with the given canonical mount.
    pub fn new(canonical: impl Into<PathBuf>) -> Self {
        Self {
            canonical: canonical.into(),
            aliases: Vec::new(),
        }
    }

    /// Adds an alias mount point.
    pub fn with_alias(mut self, alias: impl Into<PathBuf>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// True when no rewriting can ever apply.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Rewrites `path` onto the canonical mount when it lies under one of
    /// the aliases. Returns `None` when the path is not alias-prefixed
    /// (including when it is already canonical).
    pub fn canonicalize(&self, path: &Path) -> Option<PathBuf> {
        for alias in &self.aliases {
            if let Ok(rest) = path.strip_prefix(alias) {
                return Some(self.canonical.join(rest));
            }
        }
        None
    }
}

/// Catalog configuration.
///
/// Construct through [`CatalogConfig::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Path to the SQLite catalog database, or `:memory:` for tests.
    pub database_path: PathBuf,

    /// External-storage mount aliases for URI canonicalization.
    pub storage_mounts: StorageMounts,

    /// Minimum shared-prefix length before two titles merge into one group.
    pub min_group_prefix_len: usize,

    /// Per-subscriber buffer size for the notification buses.
    pub event_buffer_size: usize,
}

impl CatalogConfig {
    /// Creates a new builder.
    pub fn builder() -> CatalogConfigBuilder {
        CatalogConfigBuilder::default()
    }
}

/// Builder for [`CatalogConfig`].
#[derive(Debug, Clone, Default)]
pub struct CatalogConfigBuilder {
    database_path: Option<PathBuf>,
    storage_mounts: StorageMounts,
    min_group_prefix_len: Option<usize>,
    event_buffer_size: Option<usize>,
}

impl CatalogConfigBuilder {
    /// Sets the database path (required).
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the storage mount alias table.
    pub fn storage_mounts(mut self, mounts: StorageMounts) -> Self {
        self.storage_mounts = mounts;
        self
    }

    /// Sets the grouping threshold. `0` disables prefix merging.
    pub fn min_group_prefix_len(mut self, len: usize) -> Self {
        self.min_group_prefix_len = Some(len);
        self
    }

    /// Sets the notification buffer size.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the database path is missing or empty,
    /// when the buffer size is zero, or when mount aliases are configured
    /// without a canonical mount to rewrite onto.
    pub fn build(self) -> Result<CatalogConfig> {
        let database_path = self
            .database_path
            .ok_or_else(|| Error::Config("database_path is required".to_string()))?;
        if database_path.as_os_str().is_empty() {
            return Err(Error::Config("database_path cannot be empty".to_string()));
        }

        let event_buffer_size = self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);
        if event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be greater than zero".to_string(),
            ));
        }

        if !self.storage_mounts.aliases.is_empty()
            && self.storage_mounts.canonical.as_os_str().is_empty()
        {
            return Err(Error::Config(
                "storage mount aliases require a canonical mount point".to_string(),
            ));
        }

        Ok(CatalogConfig {
            database_path,
            storage_mounts: self.storage_mounts,
            min_group_prefix_len: self
                .min_group_prefix_len
                .unwrap_or(DEFAULT_MIN_GROUP_PREFIX_LEN),
            event_buffer_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_defaults() {
        let config = CatalogConfig::builder()
            .database_path("/data/catalog.db")
            .build()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/data/catalog.db"));
        assert_eq!(config.min_group_prefix_len, DEFAULT_MIN_GROUP_PREFIX_LEN);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.storage_mounts.is_empty());
    }

    #[test]
    fn test_missing_database_path_fails() {
        let result = CatalogConfig::builder().build();
        assert!(result.is_err());

        let result = CatalogConfig::builder().database_path("").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_buffer_size_fails() {
        let result = CatalogConfig::builder()
            .database_path("/data/catalog.db")
            .event_buffer_size(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_aliases_without_canonical_fail() {
        let mounts = StorageMounts::default().with_alias("/mnt/media");
        let result = CatalogConfig::builder()
            .database_path("/data/catalog.db")
            .storage_mounts(mounts)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_threshold_is_allowed() {
        // 0 is a meaningful value (grouping disabled), not a missing one.
        let config = CatalogConfig::builder()
            .database_path("/data/catalog.db")
            .min_group_prefix_len(0)
            .build()
            .unwrap();
        assert_eq!(config.min_group_prefix_len, 0);
    }

    #[test]
    fn test_mount_canonicalize() {
        let mounts = StorageMounts::new("/storage/emulated/0")
            .with_alias("/storage/sdcard0")
            .with_alias("/mnt/media");

        assert_eq!(
            mounts.canonicalize(Path::new("/storage/sdcard0/Movies/a.mp4")),
            Some(PathBuf::from("/storage/emulated/0/Movies/a.mp4"))
        );
        assert_eq!(
            mounts.canonicalize(Path::new("/mnt/media/b.mkv")),
            Some(PathBuf::from("/storage/emulated/0/b.mkv"))
        );
        // Already canonical, or unrelated: no rewrite.
        assert_eq!(
            mounts.canonicalize(Path::new("/storage/emulated/0/Movies/a.mp4")),
            None
        );
        assert_eq!(mounts.canonicalize(Path::new("/home/user/a.mp4")), None);
    }
}
