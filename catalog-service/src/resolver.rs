//! Identity resolution
//!
//! Maps an incoming reference onto the durable catalog entity it denotes.
//! Path-addressed candidates resolve by exact locator, retrying through the
//! device's storage-mount alias table; hash-addressed candidates resolve by
//! `(content hash, file index)` because the same content can be reached
//! through different locator strings.
//!
//! Resolution is read-only. It never inserts and never fabricates ids;
//! persistence stays with the facade.

use crate::error::{Result, ServiceError};
use catalog_library::models::{
    is_internal_proxy, MediaEntity, MediaSource, TransportDescriptor, TransportFile,
};
use catalog_library::repositories::MediaRepository;
use catalog_runtime::config::StorageMounts;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Outcome of a resolution attempt.
///
/// `NoMatch` is an ordinary answer, not an error; malformed input surfaces
/// as [`ServiceError::Validation`] before any lookup happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The durable entity the candidate denotes.
    Durable(MediaEntity),
    /// No durable entity exists; the caller decides whether to insert.
    NoMatch,
}

/// Checks producer input for hash-addressed ingestion before resolution is
/// attempted: the descriptor must carry a hash, the file a real name, and
/// neither may smuggle in an internal proxy placeholder.
pub fn validate_transport_input(
    descriptor: &TransportDescriptor,
    file: &TransportFile,
) -> Result<()> {
    if descriptor.content_hash.trim().is_empty() {
        return Err(ServiceError::Validation(
            "transport descriptor carries no content hash".to_string(),
        ));
    }
    if file.filename.trim().is_empty() {
        return Err(ServiceError::Validation(
            "transport file carries an empty filename".to_string(),
        ));
    }
    if is_internal_proxy(&file.filename) {
        return Err(ServiceError::Validation(format!(
            "'{}' is an internal proxy placeholder, not a filename",
            file.filename
        )));
    }
    Ok(())
}

fn rewrite_file_uri(uri: &str, mounts: &StorageMounts) -> Option<String> {
    let path = uri.strip_prefix("file://")?;
    let rewritten = mounts.canonicalize(Path::new(path))?;
    Some(format!("file://{}", rewritten.display()))
}

/// Find-or-miss mapping from candidate entities to durable catalog ids.
pub struct IdentityResolver {
    media: Arc<dyn MediaRepository>,
    mounts: StorageMounts,
}

impl IdentityResolver {
    pub fn new(media: Arc<dyn MediaRepository>, mounts: StorageMounts) -> Self {
        Self { media, mounts }
    }

    /// Resolves `candidate` to the durable entity it denotes.
    ///
    /// An already durable candidate resolves to itself. A candidate with
    /// neither a usable locator nor a content hash resolves to `NoMatch`.
    /// Internal proxy placeholder locators are rejected as
    /// [`ServiceError::Validation`].
    pub async fn resolve(&self, candidate: &MediaEntity) -> Result<Resolution> {
        if !candidate.is_transient() {
            return Ok(Resolution::Durable(candidate.clone()));
        }

        match &candidate.source {
            MediaSource::HashAddressed {
                content_hash,
                file_index,
                ..
            } => {
                if content_hash.trim().is_empty() {
                    // No usable key at all: a miss, not an error.
                    return Ok(Resolution::NoMatch);
                }
                match self.media.find_by_hash(content_hash, *file_index).await? {
                    Some(entity) => Ok(Resolution::Durable(entity)),
                    None => Ok(Resolution::NoMatch),
                }
            }
            MediaSource::Regular { uri } => {
                if uri.trim().is_empty() {
                    return Ok(Resolution::NoMatch);
                }
                if is_internal_proxy(uri) {
                    return Err(ServiceError::Validation(format!(
                        "'{uri}' is an internal proxy placeholder"
                    )));
                }

                if let Some(entity) = self.media.find_by_uri(uri).await? {
                    return Ok(Resolution::Durable(entity));
                }

                // Retry through the mount alias table for file URIs living
                // on aliased external storage.
                if let Some(rewritten) = rewrite_file_uri(uri, &self.mounts) {
                    debug!(from = %uri, to = %rewritten, "retrying lookup on canonical mount");
                    if let Some(entity) = self.media.find_by_uri(&rewritten).await? {
                        return Ok(Resolution::Durable(entity));
                    }
                }

                Ok(Resolution::NoMatch)
            }
        }
    }
}
