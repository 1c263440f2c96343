//! Recording ingest pipeline stages
//!
//! Stages run in this order for each pending recording:
//! path_resolver → formats::detect → file_enumerator → metadata_extractor →
//! timestamp_reconciler → aggregator. The scheduler drives them.

pub mod aggregator;
pub mod file_enumerator;
pub mod metadata_extractor;
pub mod path_resolver;
pub mod scheduler;
pub mod timestamp_reconciler;

pub use aggregator::{aggregate, persist};
pub use file_enumerator::enumerate;
pub use metadata_extractor::extract;
pub use path_resolver::{relative_to_root, resolve};
pub use scheduler::{PopulationScheduler, StatusCounts};
pub use timestamp_reconciler::{reconcile, Timeline};
