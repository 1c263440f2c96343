//! Database access for recording ingest
//!
//! Plain async functions over a `SqlitePool`; `store::SqliteMetadataStore`
//! composes them behind the `MetadataStore` trait.

pub mod claims;
pub mod metadata;
pub mod recordings;

pub use metadata::UpsertOutcome;
