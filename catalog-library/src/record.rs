//! Compact interchange records for catalog entities
//!
//! An entity serializes to a one-line JSON record of one of two shapes:
//! `{uri, title}` for path-addressed media or
//! `{media_file, transport_descriptor, title}` for hash-addressed media.
//! Field order is fixed and absent fields are omitted, so encoding a decoded
//! record reproduces it byte for byte.
//!
//! Decoding any other shape is a fatal [`LibraryError::Decode`]; records are
//! never silently defaulted.

use crate::error::{LibraryError, Result};
use crate::models::{classify_locator, LiveState, MediaEntity, MediaKind, MediaSource};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct MediaFileField {
    index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TransportDescriptorField {
    infohash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_file: Option<MediaFileField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transport_descriptor: Option<TransportDescriptorField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

/// Encodes an entity into its interchange record.
pub fn encode(entity: &MediaEntity) -> Result<String> {
    let record = match &entity.source {
        MediaSource::Regular { uri } => RawRecord {
            uri: Some(uri.clone()),
            title: entity.title().map(str::to_string),
            ..RawRecord::default()
        },
        MediaSource::HashAddressed {
            content_hash,
            file_index,
            ..
        } => RawRecord {
            media_file: Some(MediaFileField { index: *file_index }),
            transport_descriptor: Some(TransportDescriptorField {
                infohash: content_hash.clone(),
            }),
            title: entity.title().map(str::to_string),
            ..RawRecord::default()
        },
    };

    serde_json::to_string(&record).map_err(|e| LibraryError::Decode(e.to_string()))
}

/// Decodes an interchange record into a transient entity.
///
/// # Errors
///
/// Fails with [`LibraryError::Decode`] when the input is not valid JSON,
/// carries both shapes at once, carries an empty hash, or carries neither a
/// `uri` nor a `media_file` + `transport_descriptor` pair.
pub fn decode(input: &str) -> Result<MediaEntity> {
    let record: RawRecord =
        serde_json::from_str(input).map_err(|e| LibraryError::Decode(e.to_string()))?;

    let hash_shape = record.media_file.is_some() || record.transport_descriptor.is_some();
    match (record.uri, record.media_file, record.transport_descriptor) {
        (Some(_), _, _) if hash_shape => Err(LibraryError::Decode(
            "record carries both a uri and a transport shape".to_string(),
        )),
        (Some(uri), _, _) => {
            let kind = classify_locator(&uri);
            let mut entity = MediaEntity::new(MediaSource::Regular { uri }, kind);
            if let Some(title) = record.title {
                entity.set_title(&title);
            }
            Ok(entity)
        }
        (None, Some(file), Some(descriptor)) => {
            if descriptor.infohash.trim().is_empty() {
                return Err(LibraryError::Decode(
                    "transport descriptor carries an empty hash".to_string(),
                ));
            }
            let kind = record
                .title
                .as_deref()
                .and_then(|t| t.rsplit_once('.').and_then(|(_, e)| MediaKind::from_extension(e)))
                .unwrap_or(MediaKind::Video);
            let mut entity = MediaEntity::hash_addressed(
                descriptor.infohash,
                file.index,
                None,
                LiveState::Unknown,
                kind,
            );
            if let Some(title) = record.title {
                entity.set_title(&title);
            }
            Ok(entity)
        }
        _ => Err(LibraryError::Decode(
            "record has neither a uri nor a media file with its descriptor".to_string(),
        )),
    }
}
