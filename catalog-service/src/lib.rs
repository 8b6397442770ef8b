//! # Catalog Service
//!
//! The operation surface of the media catalog core.
//!
//! ## Overview
//!
//! This crate composes the data layer into the public catalog API:
//! - [`MediaCatalog`]: the facade handle with its init/shutdown lifecycle,
//!   ingestion, lookup, listings, overlay metadata and the rescan state
//!   machine
//! - [`IdentityResolver`]: read-only find-or-miss resolution of incoming
//!   references onto durable catalog entities
//! - [`DiscoveryDriver`]: the seam through which hosts plug bulk
//!   discovery (filesystem scans, peer sessions) into the catalog

pub mod discovery;
pub mod error;
pub mod facade;
pub mod resolver;

pub use discovery::{DiscoveryDriver, DiscoveryStats, ScanSession};
pub use error::{Result, ServiceError};
pub use facade::{BatchDeleteOutcome, MediaCatalog};
pub use resolver::{validate_transport_input, IdentityResolver, Resolution};
