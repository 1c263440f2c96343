//! mscope-ingest library interface
//!
//! Discovery and metadata extraction for raw miniscope recordings. The
//! binary in `main.rs` is a thin CLI over [`PopulationScheduler`].

pub mod db;
pub mod error;
pub mod formats;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use crate::db::UpsertOutcome;
pub use crate::error::{ErrorKind, IngestError, IngestResult};
pub use crate::formats::{detect, AcquisitionFormat, AcquisitionSoftware};
pub use crate::models::{PopulateReport, RecordingKey, RecordingMetadata, RecordingReference};
pub use crate::services::{PopulationScheduler, StatusCounts};
pub use crate::store::{MetadataStore, SqliteMetadataStore};
