//! # Storage Engine Access
//!
//! Repository traits and their SQLite implementations. The rest of the
//! system talks to the storage engine exclusively through these traits, so
//! tests can substitute mocks and the engine stays swappable.
//!
//! - [`MediaRepository`]: CRUD, exact-URI and hash+index lookup, filtered
//!   listings and orphan cleanup for media entities
//! - [`MetadataRepository`]: the keyed long/string overlay side-table
//! - [`Page`] / [`PageRequest`]: pagination for bulk listings

pub mod media;
pub mod metadata;
pub mod pagination;

pub use media::{ListingFilter, MediaRepository, SqliteMediaRepository};
pub use metadata::{meta_keys, MetadataRepository, SqliteMetadataRepository};
pub use pagination::{Page, PageRequest};
