//! # Catalog Runtime Module
//!
//! Foundational infrastructure for the media catalog core:
//! - Configuration management
//! - Logging and tracing bootstrap
//! - Change-notification event buses
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the catalog modules depend on.
//! It establishes the logging conventions and the broadcast mechanisms used
//! to fan catalog changes out to listeners.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
