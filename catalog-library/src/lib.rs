//! # Catalog Data Layer
//!
//! Owns the durable media catalog and the pure algorithms over it.
//!
//! ## Overview
//!
//! This crate provides:
//! - The [`models`] module: the `MediaEntity` record type covering both
//!   path-addressed and hash-addressed content, transport descriptor types
//!   and media-kind classification
//! - The [`record`] module: the compact interchange record codec
//! - The [`db`] module: SQLite connection pooling and embedded migrations
//! - The [`repositories`] module: storage-engine access behind async traits
//! - The [`grouping`] module: title-prefix clustering for display

pub mod db;
pub mod error;
pub mod grouping;
pub mod models;
pub mod record;
pub mod repositories;

pub use error::{LibraryError, Result};
