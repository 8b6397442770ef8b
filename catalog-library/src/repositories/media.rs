//! Media repository trait and SQLite implementation

use crate::error::{LibraryError, Result};
use crate::models::{LiveState, MediaEntity, MediaId, MediaKind, MediaSource};
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

/// Filter dimensions for bulk listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingFilter {
    /// Restrict to hash-addressed (`Some(true)`) or path-addressed
    /// (`Some(false)`) entities.
    pub hash_addressed: Option<bool>,
    /// Restrict to live (`Some(true)`) or non-live (`Some(false)`) entities;
    /// unknown live state counts as non-live.
    pub live: Option<bool>,
}

impl ListingFilter {
    pub fn hash_addressed(mut self, value: bool) -> Self {
        self.hash_addressed = Some(value);
        self
    }

    pub fn live(mut self, value: bool) -> Self {
        self.live = Some(value);
        self
    }
}

/// Media entity data access.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Find an entity by catalog id.
    async fn find_by_id(&self, id: MediaId) -> Result<Option<MediaEntity>>;

    /// Find an entity by exact locator.
    ///
    /// Locators are not unique across the catalog; the lookup returns the
    /// earliest-inserted match.
    async fn find_by_uri(&self, uri: &str) -> Result<Option<MediaEntity>>;

    /// Find the hash-addressed entity for a `(hash, file index)` pair.
    async fn find_by_hash(&self, content_hash: &str, file_index: u32)
        -> Result<Option<MediaEntity>>;

    /// All entities selected out of a bundle, ordered by file index.
    async fn find_all_by_hash(&self, content_hash: &str) -> Result<Vec<MediaEntity>>;

    /// Entities sharing a content hash with at least one sibling.
    async fn find_duplicate_hashes(&self) -> Result<Vec<MediaEntity>>;

    /// Children of a transport descriptor.
    async fn find_by_parent(&self, parent: MediaId) -> Result<Vec<MediaEntity>>;

    /// Persist a transient entity, returning its new catalog id.
    ///
    /// # Errors
    ///
    /// Fails when the entity is already durable, fails validation, or
    /// violates the hash+index uniqueness index.
    async fn insert(&self, entity: &MediaEntity) -> Result<MediaId>;

    /// Update a durable entity in place.
    async fn update(&self, entity: &MediaEntity) -> Result<()>;

    /// Delete an entity by id.
    ///
    /// Returns `false` when nothing matched. Overlay metadata cascades via
    /// the schema.
    async fn delete(&self, id: MediaId) -> Result<bool>;

    /// Filtered listing of one media kind, ordered by title.
    async fn list(
        &self,
        kind: MediaKind,
        filter: ListingFilter,
        page: PageRequest,
    ) -> Result<Page<MediaEntity>>;

    /// Filtered listing of one media kind, most recently seen first.
    async fn list_recent(
        &self,
        kind: MediaKind,
        filter: ListingFilter,
        page: PageRequest,
    ) -> Result<Page<MediaEntity>>;

    /// Delete transport descriptors with zero remaining children.
    ///
    /// Returns the number of descriptors removed.
    async fn remove_orphan_descriptors(&self) -> Result<u64>;

    /// Total entity count.
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of [`MediaRepository`].
pub struct SqliteMediaRepository {
    pool: SqlitePool,
}

impl SqliteMediaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Flat row mirror of the `media` table.
///
/// The tagged [`MediaSource`] does not map onto a row directly, so rows are
/// read into this struct and converted, validating the hash shape on the
/// way out.
#[derive(Debug, FromRow)]
struct MediaRow {
    id: i64,
    uri: String,
    kind: String,
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    album_artist: Option<String>,
    genre: Option<String>,
    track_number: Option<i64>,
    disc_number: Option<i64>,
    artwork_uri: Option<String>,
    position_ms: i64,
    duration_ms: i64,
    audio_track: i64,
    spu_track: i64,
    last_modified: Option<i64>,
    last_seen: Option<i64>,
    flags: i64,
    is_hash_addressed: i64,
    content_hash: Option<String>,
    file_index: Option<i64>,
    live_state: i64,
    parent_transport_id: Option<i64>,
    group_title: Option<String>,
}

impl MediaRow {
    fn into_entity(self) -> Result<MediaEntity> {
        let kind = MediaKind::parse(&self.kind).ok_or_else(|| LibraryError::InvalidInput {
            field: "kind".to_string(),
            message: format!("unknown media kind '{}'", self.kind),
        })?;

        let source = if self.is_hash_addressed != 0 {
            let content_hash = self.content_hash.ok_or_else(|| LibraryError::InvalidInput {
                field: "content_hash".to_string(),
                message: format!("hash-addressed row {} lacks a hash", self.id),
            })?;
            let file_index = self.file_index.ok_or_else(|| LibraryError::InvalidInput {
                field: "file_index".to_string(),
                message: format!("hash-addressed row {} lacks a file index", self.id),
            })? as u32;
            MediaSource::HashAddressed {
                content_hash,
                file_index,
                parent: self.parent_transport_id.map(MediaId),
                live: LiveState::from_raw(self.live_state),
            }
        } else {
            MediaSource::Regular { uri: self.uri }
        };

        let mut entity = MediaEntity::new(source, kind);
        entity.id = MediaId(self.id);
        if let Some(v) = &self.title {
            entity.set_title(v);
        }
        if let Some(v) = &self.artist {
            entity.set_artist(v);
        }
        if let Some(v) = &self.album {
            entity.set_album(v);
        }
        if let Some(v) = &self.album_artist {
            entity.set_album_artist(v);
        }
        if let Some(v) = &self.genre {
            entity.set_genre(v);
        }
        if let Some(v) = &self.artwork_uri {
            entity.set_artwork_uri(v);
        }
        if let Some(v) = &self.group_title {
            entity.set_group_title(v);
        }
        entity.track_number = self.track_number.map(|v| v as u32);
        entity.disc_number = self.disc_number.map(|v| v as u32);
        entity.position_ms = self.position_ms;
        entity.duration_ms = self.duration_ms;
        entity.audio_track = self.audio_track as i32;
        entity.spu_track = self.spu_track as i32;
        entity.last_modified = self.last_modified;
        entity.last_seen = self.last_seen;
        entity.restore_flags(self.flags as u32);
        Ok(entity)
    }
}

/// Column values of the source-dependent part of a row.
struct SourceColumns<'a> {
    is_hash_addressed: i64,
    content_hash: Option<&'a str>,
    file_index: Option<i64>,
    live_state: i64,
    parent_transport_id: Option<i64>,
}

fn source_columns(entity: &MediaEntity) -> SourceColumns<'_> {
    match &entity.source {
        MediaSource::Regular { .. } => SourceColumns {
            is_hash_addressed: 0,
            content_hash: None,
            file_index: None,
            live_state: LiveState::Unknown.as_raw(),
            parent_transport_id: None,
        },
        MediaSource::HashAddressed {
            content_hash,
            file_index,
            parent,
            live,
        } => SourceColumns {
            is_hash_addressed: 1,
            content_hash: Some(content_hash),
            file_index: Some(*file_index as i64),
            live_state: live.as_raw(),
            parent_transport_id: parent.map(|p| p.0),
        },
    }
}

fn rows_into_entities(rows: Vec<MediaRow>) -> Result<Vec<MediaEntity>> {
    rows.into_iter().map(MediaRow::into_entity).collect()
}

fn push_listing_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    kind: MediaKind,
    filter: &ListingFilter,
) {
    builder.push(" WHERE kind = ").push_bind(kind.as_str());
    if let Some(hashed) = filter.hash_addressed {
        builder
            .push(" AND is_hash_addressed = ")
            .push_bind(i64::from(hashed));
    }
    if let Some(live) = filter.live {
        if live {
            builder.push(" AND live_state = 1");
        } else {
            builder.push(" AND live_state <> 1");
        }
    }
}

impl SqliteMediaRepository {
    async fn query_page(
        &self,
        kind: MediaKind,
        filter: ListingFilter,
        page: PageRequest,
        recent: bool,
    ) -> Result<Page<MediaEntity>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM media");
        push_listing_filters(&mut count, kind, &filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new("SELECT * FROM media");
        push_listing_filters(&mut select, kind, &filter);
        if recent {
            select.push(" ORDER BY last_seen DESC, id DESC");
        } else {
            select.push(" ORDER BY title COLLATE NOCASE, id");
        }
        select
            .push(" LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows: Vec<MediaRow> = select.build_query_as().fetch_all(&self.pool).await?;
        Ok(Page::new(rows_into_entities(rows)?, total as u64, page))
    }
}

#[async_trait]
impl MediaRepository for SqliteMediaRepository {
    async fn find_by_id(&self, id: MediaId) -> Result<Option<MediaEntity>> {
        let row = sqlx::query_as::<_, MediaRow>("SELECT * FROM media WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(MediaRow::into_entity).transpose()
    }

    async fn find_by_uri(&self, uri: &str) -> Result<Option<MediaEntity>> {
        let row =
            sqlx::query_as::<_, MediaRow>("SELECT * FROM media WHERE uri = ? ORDER BY id LIMIT 1")
                .bind(uri)
                .fetch_optional(&self.pool)
                .await?;
        row.map(MediaRow::into_entity).transpose()
    }

    async fn find_by_hash(
        &self,
        content_hash: &str,
        file_index: u32,
    ) -> Result<Option<MediaEntity>> {
        let row = sqlx::query_as::<_, MediaRow>(
            "SELECT * FROM media WHERE is_hash_addressed = 1 AND content_hash = ? AND file_index = ?",
        )
        .bind(content_hash)
        .bind(file_index as i64)
        .fetch_optional(&self.pool)
        .await?;
        row.map(MediaRow::into_entity).transpose()
    }

    async fn find_all_by_hash(&self, content_hash: &str) -> Result<Vec<MediaEntity>> {
        let rows = sqlx::query_as::<_, MediaRow>(
            "SELECT * FROM media WHERE is_hash_addressed = 1 AND content_hash = ? ORDER BY file_index",
        )
        .bind(content_hash)
        .fetch_all(&self.pool)
        .await?;
        rows_into_entities(rows)
    }

    async fn find_duplicate_hashes(&self) -> Result<Vec<MediaEntity>> {
        let rows = sqlx::query_as::<_, MediaRow>(
            r#"
            SELECT * FROM media
            WHERE is_hash_addressed = 1 AND content_hash IN (
                SELECT content_hash FROM media
                WHERE is_hash_addressed = 1
                GROUP BY content_hash
                HAVING COUNT(*) > 1
            )
            ORDER BY content_hash, file_index
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows_into_entities(rows)
    }

    async fn find_by_parent(&self, parent: MediaId) -> Result<Vec<MediaEntity>> {
        let rows = sqlx::query_as::<_, MediaRow>(
            "SELECT * FROM media WHERE parent_transport_id = ? ORDER BY file_index, id",
        )
        .bind(parent.0)
        .fetch_all(&self.pool)
        .await?;
        rows_into_entities(rows)
    }

    async fn insert(&self, entity: &MediaEntity) -> Result<MediaId> {
        if !entity.is_transient() {
            return Err(LibraryError::InvalidInput {
                field: "id".to_string(),
                message: format!("entity {} is already durable", entity.id),
            });
        }
        entity.validate()?;

        let source = source_columns(entity);
        let result = sqlx::query(
            r#"
            INSERT INTO media (
                uri, kind, title, artist, album, album_artist, genre,
                track_number, disc_number, artwork_uri,
                position_ms, duration_ms, audio_track, spu_track,
                last_modified, last_seen, flags,
                is_hash_addressed, content_hash, file_index, live_state,
                parent_transport_id, group_title
            ) VALUES (
                ?, ?, ?, ?, ?, ?, ?,
                ?, ?, ?,
                ?, ?, ?, ?,
                ?, ?, ?,
                ?, ?, ?, ?,
                ?, ?
            )
            "#,
        )
        .bind(entity.locator())
        .bind(entity.kind.as_str())
        .bind(entity.title())
        .bind(entity.artist())
        .bind(entity.album())
        .bind(entity.album_artist())
        .bind(entity.genre())
        .bind(entity.track_number.map(|v| v as i64))
        .bind(entity.disc_number.map(|v| v as i64))
        .bind(entity.artwork_uri())
        .bind(entity.position_ms)
        .bind(entity.duration_ms)
        .bind(entity.audio_track as i64)
        .bind(entity.spu_track as i64)
        .bind(entity.last_modified)
        .bind(entity.last_seen)
        .bind(entity.flags() as i64)
        .bind(source.is_hash_addressed)
        .bind(source.content_hash)
        .bind(source.file_index)
        .bind(source.live_state)
        .bind(source.parent_transport_id)
        .bind(entity.group_title())
        .execute(&self.pool)
        .await?;

        Ok(MediaId(result.last_insert_rowid()))
    }

    async fn update(&self, entity: &MediaEntity) -> Result<()> {
        if entity.is_transient() {
            return Err(LibraryError::InvalidInput {
                field: "id".to_string(),
                message: "cannot update a transient entity".to_string(),
            });
        }
        entity.validate()?;

        let source = source_columns(entity);
        let result = sqlx::query(
            r#"
            UPDATE media SET
                uri = ?, kind = ?, title = ?, artist = ?, album = ?,
                album_artist = ?, genre = ?, track_number = ?, disc_number = ?,
                artwork_uri = ?, position_ms = ?, duration_ms = ?,
                audio_track = ?, spu_track = ?, last_modified = ?, last_seen = ?,
                flags = ?, is_hash_addressed = ?, content_hash = ?,
                file_index = ?, live_state = ?, parent_transport_id = ?,
                group_title = ?
            WHERE id = ?
            "#,
        )
        .bind(entity.locator())
        .bind(entity.kind.as_str())
        .bind(entity.title())
        .bind(entity.artist())
        .bind(entity.album())
        .bind(entity.album_artist())
        .bind(entity.genre())
        .bind(entity.track_number.map(|v| v as i64))
        .bind(entity.disc_number.map(|v| v as i64))
        .bind(entity.artwork_uri())
        .bind(entity.position_ms)
        .bind(entity.duration_ms)
        .bind(entity.audio_track as i64)
        .bind(entity.spu_track as i64)
        .bind(entity.last_modified)
        .bind(entity.last_seen)
        .bind(entity.flags() as i64)
        .bind(source.is_hash_addressed)
        .bind(source.content_hash)
        .bind(source.file_index)
        .bind(source.live_state)
        .bind(source.parent_transport_id)
        .bind(entity.group_title())
        .bind(entity.id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "MediaEntity".to_string(),
                id: entity.id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, id: MediaId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        kind: MediaKind,
        filter: ListingFilter,
        page: PageRequest,
    ) -> Result<Page<MediaEntity>> {
        self.query_page(kind, filter, page, false).await
    }

    async fn list_recent(
        &self,
        kind: MediaKind,
        filter: ListingFilter,
        page: PageRequest,
    ) -> Result<Page<MediaEntity>> {
        self.query_page(kind, filter, page, true).await
    }

    async fn remove_orphan_descriptors(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM media
            WHERE kind = ? AND id NOT IN (
                SELECT DISTINCT parent_transport_id FROM media
                WHERE parent_transport_id IS NOT NULL AND parent_transport_id > 0
            )
            "#,
        )
        .bind(MediaKind::TransportDescriptor.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
