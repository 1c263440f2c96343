//! # mscope-common
//!
//! Shared code for the miniscope ingest services:
//! - Error type shared by storage and configuration code
//! - Configuration loading (TOML file, environment, compiled defaults)
//! - SQLite schema initialization

pub mod config;
pub mod db;
pub mod error;

pub use config::{IngestConfig, RootPolicy};
pub use error::{Error, Result};
