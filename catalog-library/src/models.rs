//! Domain models for the media catalog
//!
//! The catalog records both ordinary path-addressed media and peer-delivered
//! hash-addressed content behind a single entity type. The hash-addressed
//! portion is a tagged variant of [`MediaSource`] so that exactly one shape
//! is populated at construction time.

use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Identifiers and locators
// =============================================================================

/// Catalog-assigned entity identifier.
///
/// `0` marks a transient entity that has not been persisted and carries no
/// durable identity. `-1` is the distinguished parent id assigned to
/// transport descriptors imported from private internal storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaId(pub i64);

impl MediaId {
    /// The not-yet-persisted sentinel.
    pub const TRANSIENT: MediaId = MediaId(0);

    /// Parent id marking descriptors that came from internal storage
    /// rather than user-visible storage.
    pub const INTERNAL_PARENT: MediaId = MediaId(-1);

    /// True when the entity has no durable identity yet.
    pub fn is_transient(self) -> bool {
        self.0 == 0
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::TRANSIENT
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// URI scheme for hash-addressed content locators.
pub const PEER_SCHEME: &str = "peer";

/// Prefix of placeholder locators pointing at the local delivery engine's
/// proxy endpoint. These never identify content and are rejected by
/// validation.
pub const INTERNAL_PROXY_PREFIX: &str = "proxy://";

/// Builds the canonical locator of one file inside a hash-addressed bundle.
pub fn peer_locator(content_hash: &str, file_index: u32) -> String {
    format!("{PEER_SCHEME}://?infohash={content_hash}&file_index={file_index}")
}

/// Builds the display-identity locator of a whole hash-addressed bundle.
pub fn peer_group_locator(content_hash: &str) -> String {
    format!("{PEER_SCHEME}://?infohash={content_hash}")
}

/// True for placeholder locators that must never enter the catalog.
pub fn is_internal_proxy(locator: &str) -> bool {
    locator.starts_with(INTERNAL_PROXY_PREFIX)
}

/// Parses a peer locator back into `(content_hash, file_index)`.
pub fn parse_peer_locator(locator: &str) -> Option<(String, u32)> {
    let query = locator
        .strip_prefix(PEER_SCHEME)?
        .strip_prefix("://?")
        .or_else(|| locator.strip_prefix(PEER_SCHEME)?.strip_prefix(":?"))?;

    let mut hash = None;
    let mut index = None;
    for pair in query.split('&') {
        if let Some(v) = pair.strip_prefix("infohash=") {
            hash = Some(v.to_string());
        } else if let Some(v) = pair.strip_prefix("file_index=") {
            index = v.parse::<u32>().ok();
        }
    }
    match (hash, index) {
        (Some(h), Some(i)) if !h.is_empty() => Some((h, i)),
        _ => None,
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Media kind, mutually exclusive and re-derivable at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
    Directory,
    Subtitle,
    Playlist,
    Stream,
    Group,
    TransportDescriptor,
}

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "m4v", "ts", "mpg", "mpeg", "wmv", "flv", "3gp", "ogv",
];
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "oga", "opus", "m4a", "aac", "wav", "wma", "alac", "aiff", "ape", "mka",
];
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "sub", "vtt", "idx"];
const PLAYLIST_EXTENSIONS: &[&str] = &["m3u", "m3u8", "pls", "xspf", "asx"];
const PLAYLIST_MIMES: &[&str] = &[
    "audio/x-mpegurl",
    "audio/mpegurl",
    "application/vnd.apple.mpegurl",
    "application/xspf+xml",
];
const STREAM_SCHEMES: &[&str] = &["http", "https", "rtsp", "rtp", "mms", "udp"];

impl MediaKind {
    /// Storage-layer name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Directory => "directory",
            MediaKind::Subtitle => "subtitle",
            MediaKind::Playlist => "playlist",
            MediaKind::Stream => "stream",
            MediaKind::Group => "group",
            MediaKind::TransportDescriptor => "transport_descriptor",
        }
    }

    /// Inverse of [`MediaKind::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            "directory" => Some(MediaKind::Directory),
            "subtitle" => Some(MediaKind::Subtitle),
            "playlist" => Some(MediaKind::Playlist),
            "stream" => Some(MediaKind::Stream),
            "group" => Some(MediaKind::Group),
            "transport_descriptor" => Some(MediaKind::TransportDescriptor),
            _ => None,
        }
    }

    /// Classifies from a declared MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        // Playlist MIME types start with "audio/", so they go first.
        if PLAYLIST_MIMES.contains(&mime.as_str()) {
            return Some(MediaKind::Playlist);
        }
        if mime.starts_with("video/") {
            return Some(MediaKind::Video);
        }
        if mime.starts_with("audio/") {
            return Some(MediaKind::Audio);
        }
        if mime == "application/x-subrip" || mime == "text/vtt" {
            return Some(MediaKind::Subtitle);
        }
        None
    }

    /// Classifies from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim().to_ascii_lowercase();
        let ext = ext.as_str();
        if VIDEO_EXTENSIONS.contains(&ext) {
            return Some(MediaKind::Video);
        }
        if AUDIO_EXTENSIONS.contains(&ext) {
            return Some(MediaKind::Audio);
        }
        if SUBTITLE_EXTENSIONS.contains(&ext) {
            return Some(MediaKind::Subtitle);
        }
        if PLAYLIST_EXTENSIONS.contains(&ext) {
            return Some(MediaKind::Playlist);
        }
        None
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracts the extension of the last path segment of a locator, ignoring
/// query and fragment parts.
fn locator_extension(locator: &str) -> Option<&str> {
    let path = locator.split(['?', '#']).next().unwrap_or(locator);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// Classifies a locator into a media kind.
///
/// Extension wins, then a trailing slash means directory, then well-known
/// streaming schemes; everything else defaults to video. Deterministic, so
/// re-classifying an already classified entity is a no-op.
pub fn classify_locator(locator: &str) -> MediaKind {
    if let Some(kind) = locator_extension(locator).and_then(MediaKind::from_extension) {
        return kind;
    }
    if locator.ends_with('/') {
        return MediaKind::Directory;
    }
    if let Some((scheme, _)) = locator.split_once("://") {
        if STREAM_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
            return MediaKind::Stream;
        }
    }
    MediaKind::Video
}

// =============================================================================
// Hash-addressed support types
// =============================================================================

/// Whether hash-addressed content is a live stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiveState {
    #[default]
    Unknown,
    No,
    Yes,
}

impl LiveState {
    /// Storage encoding: `-1` unknown, `0` no, `1` yes.
    pub fn as_raw(self) -> i64 {
        match self {
            LiveState::Unknown => -1,
            LiveState::No => 0,
            LiveState::Yes => 1,
        }
    }

    /// Inverse of [`LiveState::as_raw`]; anything unexpected reads as unknown.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => LiveState::No,
            1 => LiveState::Yes,
            _ => LiveState::Unknown,
        }
    }
}

/// Where a transport descriptor was imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorOrigin {
    /// User-visible storage; the descriptor has a real parent or none.
    UserStorage,
    /// Private internal storage; children get the sentinel parent id.
    InternalStorage,
}

/// Container-level record describing a hash-addressed content bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportDescriptor {
    /// Opaque content hash identifying the bundle.
    pub content_hash: String,
    /// Optional display name of the bundle.
    pub display_name: Option<String>,
    /// Import origin.
    pub origin: DescriptorOrigin,
    /// Live-stream flag declared by the delivery session.
    pub live: LiveState,
}

impl TransportDescriptor {
    pub fn new(content_hash: impl Into<String>, origin: DescriptorOrigin) -> Self {
        Self {
            content_hash: content_hash.into(),
            display_name: None,
            origin,
            live: LiveState::Unknown,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_live(mut self, live: LiveState) -> Self {
        self.live = live;
        self
    }
}

/// One file entry selected out of a transport descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFile {
    /// Index of this file within the bundle.
    pub index: u32,
    /// File name as declared by the bundle.
    pub filename: String,
    /// Declared MIME type, when the session knows it.
    pub mime_type: Option<String>,
    /// Declared size in bytes, when known.
    pub size_bytes: Option<u64>,
}

impl TransportFile {
    pub fn new(index: u32, filename: impl Into<String>) -> Self {
        Self {
            index,
            filename: filename.into(),
            mime_type: None,
            size_bytes: None,
        }
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size_bytes = Some(size);
        self
    }
}

// =============================================================================
// Media source
// =============================================================================

/// How a playable unit is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Path-addressed: a `file://`, `content://` or stream URI.
    Regular { uri: String },
    /// Hash-addressed: content reached by hash plus an index into the
    /// bundle, independent of any particular locator string.
    HashAddressed {
        content_hash: String,
        file_index: u32,
        /// The descriptor this file was selected from, when known.
        parent: Option<MediaId>,
        live: LiveState,
    },
}

impl MediaSource {
    /// Canonical locator string for this source.
    pub fn locator(&self) -> String {
        match self {
            MediaSource::Regular { uri } => uri.clone(),
            MediaSource::HashAddressed {
                content_hash,
                file_index,
                ..
            } => peer_locator(content_hash, *file_index),
        }
    }

    pub fn is_hash_addressed(&self) -> bool {
        matches!(self, MediaSource::HashAddressed { .. })
    }

    pub fn content_hash(&self) -> Option<&str> {
        match self {
            MediaSource::Regular { .. } => None,
            MediaSource::HashAddressed { content_hash, .. } => Some(content_hash),
        }
    }

    pub fn file_index(&self) -> Option<u32> {
        match self {
            MediaSource::Regular { .. } => None,
            MediaSource::HashAddressed { file_index, .. } => Some(*file_index),
        }
    }
}

// =============================================================================
// Media entity
// =============================================================================

/// Entity has been parsed for metadata.
pub const FLAG_PARSED: u32 = 1 << 0;
/// Entity must be played audio-only regardless of kind.
pub const FLAG_FORCE_AUDIO: u32 = 1 << 1;
/// A thumbnail has been generated for the entity.
pub const FLAG_THUMBNAIL_DONE: u32 = 1 << 2;

/// One playable unit in the catalog.
///
/// Descriptive fields are trimmed of surrounding whitespace on assignment,
/// which is why they sit behind `set_*` accessors; empty strings collapse to
/// `None`. The flags bitmask is likewise mutated only through
/// [`add_flag`](MediaEntity::add_flag) / [`clear_flag`](MediaEntity::clear_flag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntity {
    /// Catalog id; [`MediaId::TRANSIENT`] until persisted.
    pub id: MediaId,
    /// Addressing shape.
    pub source: MediaSource,
    /// Classified kind.
    pub kind: MediaKind,

    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    album_artist: Option<String>,
    genre: Option<String>,
    artwork_uri: Option<String>,
    group_title: Option<String>,

    /// Track position on its album, when tagged.
    pub track_number: Option<u32>,
    /// Disc number, when tagged.
    pub disc_number: Option<u32>,

    /// Last playback position in milliseconds.
    pub position_ms: i64,
    /// Duration in milliseconds, `0` when unknown.
    pub duration_ms: i64,
    /// Selected audio track index, `-1` when default.
    pub audio_track: i32,
    /// Selected subtitle track index, `-1` when default.
    pub spu_track: i32,
    /// Source mtime in unix seconds, when known.
    pub last_modified: Option<i64>,
    /// When the catalog last saw this entity, unix seconds.
    pub last_seen: Option<i64>,

    flags: u32,
}

fn trimmed(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl MediaEntity {
    /// Creates a transient entity with the given source and kind.
    pub fn new(source: MediaSource, kind: MediaKind) -> Self {
        Self {
            id: MediaId::TRANSIENT,
            source,
            kind,
            title: None,
            artist: None,
            album: None,
            album_artist: None,
            genre: None,
            artwork_uri: None,
            group_title: None,
            track_number: None,
            disc_number: None,
            position_ms: 0,
            duration_ms: 0,
            audio_track: -1,
            spu_track: -1,
            last_modified: None,
            last_seen: None,
            flags: 0,
        }
    }

    /// Creates a transient entity from a locator, classifying its kind.
    ///
    /// A `peer://` locator yields a hash-addressed entity.
    pub fn from_locator(locator: &str) -> Self {
        let locator = locator.trim();
        if let Some((hash, index)) = parse_peer_locator(locator) {
            return Self::new(
                MediaSource::HashAddressed {
                    content_hash: hash,
                    file_index: index,
                    parent: None,
                    live: LiveState::Unknown,
                },
                MediaKind::Video,
            );
        }
        Self::new(
            MediaSource::Regular {
                uri: locator.to_string(),
            },
            classify_locator(locator),
        )
    }

    /// Creates a transient hash-addressed entity.
    pub fn hash_addressed(
        content_hash: impl Into<String>,
        file_index: u32,
        parent: Option<MediaId>,
        live: LiveState,
        kind: MediaKind,
    ) -> Self {
        Self::new(
            MediaSource::HashAddressed {
                content_hash: content_hash.into(),
                file_index,
                parent,
                live,
            },
            kind,
        )
    }

    /// Canonical locator of this entity.
    pub fn locator(&self) -> String {
        self.source.locator()
    }

    pub fn is_transient(&self) -> bool {
        self.id.is_transient()
    }

    pub fn is_hash_addressed(&self) -> bool {
        self.source.is_hash_addressed()
    }

    // --- descriptive fields, trimmed on assignment ---

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = trimmed(title);
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    pub fn set_artist(&mut self, artist: &str) {
        self.artist = trimmed(artist);
    }

    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    pub fn set_album(&mut self, album: &str) {
        self.album = trimmed(album);
    }

    pub fn album_artist(&self) -> Option<&str> {
        self.album_artist.as_deref()
    }

    pub fn set_album_artist(&mut self, album_artist: &str) {
        self.album_artist = trimmed(album_artist);
    }

    pub fn genre(&self) -> Option<&str> {
        self.genre.as_deref()
    }

    pub fn set_genre(&mut self, genre: &str) {
        self.genre = trimmed(genre);
    }

    pub fn artwork_uri(&self) -> Option<&str> {
        self.artwork_uri.as_deref()
    }

    pub fn set_artwork_uri(&mut self, artwork_uri: &str) {
        self.artwork_uri = trimmed(artwork_uri);
    }

    /// Explicit grouping override used instead of computed prefix matching.
    pub fn group_title(&self) -> Option<&str> {
        self.group_title.as_deref()
    }

    pub fn set_group_title(&mut self, group_title: &str) {
        self.group_title = trimmed(group_title);
    }

    pub fn clear_group_title(&mut self) {
        self.group_title = None;
    }

    /// Title for display and grouping: the tagged title when present,
    /// otherwise the last locator segment, otherwise the locator itself.
    pub fn display_title(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        let locator = self.locator();
        let path = locator.split(['?', '#']).next().unwrap_or(&locator);
        let segment = path.rsplit('/').next().unwrap_or(path);
        if segment.is_empty() {
            locator
        } else {
            segment.to_string()
        }
    }

    // --- flags ---

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn add_flag(&mut self, flag: u32) {
        self.flags |= flag;
    }

    pub fn clear_flag(&mut self, flag: u32) {
        self.flags &= !flag;
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub(crate) fn restore_flags(&mut self, flags: u32) {
        self.flags = flags;
    }

    // --- lifecycle ---

    /// Records that the catalog saw this entity at `timestamp` (unix secs).
    pub fn mark_seen(&mut self, timestamp: i64) {
        self.last_seen = Some(timestamp);
    }

    /// Re-derives the kind from the current locator; classification is
    /// idempotent, so this never flips an already correct kind.
    pub fn reclassify(&mut self) {
        if let MediaSource::Regular { uri } = &self.source {
            self.kind = classify_locator(uri);
        }
    }

    /// Checks the invariants producers must uphold before persistence.
    pub fn validate(&self) -> Result<()> {
        match &self.source {
            MediaSource::Regular { uri } => {
                if uri.trim().is_empty() {
                    return Err(LibraryError::InvalidInput {
                        field: "uri".to_string(),
                        message: "locator cannot be empty".to_string(),
                    });
                }
            }
            MediaSource::HashAddressed { content_hash, .. } => {
                if content_hash.trim().is_empty() {
                    return Err(LibraryError::InvalidInput {
                        field: "content_hash".to_string(),
                        message: "content hash cannot be empty".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

// =============================================================================
// Tests
// =============================================================================
