//! # RDR Common Library
//!
//! Shared code for RDR backend services including:
//! - Database initialization, schema, and settings
//! - Domain model types and code tables
//! - Shared-secret API authentication helpers
//! - Configuration loading
//! - Timestamp utilities

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
