//! Test Helper Utilities
//!
//! Shared fixtures for mscope-ingest integration tests

#![allow(dead_code)]

pub mod avi_fixtures;
pub mod db_utils;

pub use avi_fixtures::{avi_bytes, write_avi, write_v3_timestamps, write_v4_metadata, write_v4_timestamps};
pub use db_utils::{create_test_db, key, register, test_config};
