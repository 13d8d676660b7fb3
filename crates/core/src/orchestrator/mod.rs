//! Artifact tracker orchestration.
//!
//! The tracker is the entry point for every lifecycle operation:
//! - **Add**: create or promote a record, then dispatch collection
//! - **Track / ReTrack**: re-collect one artifact or the whole catalog
//! - **Validate**: integrity sweep, never collects
//! - **Delete / Collect**: single-item administrative operations
//!
//! Per-item failures inside sweeps are contained and reported.

mod tracker;
mod types;

pub use tracker::ArtifactTracker;
pub use types::{AddOutcome, Dispatched, SweepReport, TrackerError, ValidationReport};
