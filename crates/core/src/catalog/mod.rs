//! Artifact catalog - the durable store of artifacts and processors.
//!
//! The catalog is the only shared mutable resource. There is no global lock:
//! every write is keyed by (processor, id) and either a full-record upsert or
//! a conditional single-key update, so concurrent writers converge.

mod cached;
mod sqlite;
mod types;

pub use cached::CachedCatalog;
pub use sqlite::SqliteCatalog;
pub use types::*;

use std::collections::HashMap;

use crate::artifact::{Artifact, ArtifactFilter, ArtifactStatus};
use crate::processor::Processor;

/// Trait for artifact catalog storage.
pub trait ArtifactCatalog: Send + Sync {
    /// Get an artifact by processor and id.
    fn get_artifact(&self, processor: &str, id: &str) -> Result<Option<Artifact>, CatalogError>;

    /// List artifacts matching the filter.
    fn list_artifacts(&self, filter: &ArtifactFilter) -> Result<Vec<Artifact>, CatalogError>;

    /// Insert the artifact if its key is absent.
    ///
    /// Returns true if this call created the record. Of several concurrent
    /// callers for the same key exactly one sees true.
    fn create_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError>;

    /// Flip `root` from false to true.
    ///
    /// Returns true if this call changed the record, false if it was already
    /// root. Fails with `NotFound` if the artifact does not exist.
    fn promote_root(&self, processor: &str, id: &str) -> Result<bool, CatalogError>;

    /// Full-record write keyed by (processor, id).
    ///
    /// Last write wins for every field except `root`, which never goes from
    /// true back to false.
    fn upsert_artifact(&self, artifact: &Artifact) -> Result<(), CatalogError>;

    /// Full-record write of an existing artifact.
    ///
    /// Returns false and writes nothing when the record is gone, so a
    /// collection racing a delete cannot bring the artifact back. `root`
    /// never goes from true back to false.
    fn update_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError>;

    /// Number of artifacts per status. Statuses with no artifacts are absent.
    fn count_by_status(&self) -> Result<HashMap<ArtifactStatus, usize>, CatalogError>;

    /// Remove an artifact. Returns false if nothing was removed.
    fn delete_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError>;

    /// Get a processor by name.
    fn get_processor(&self, name: &str) -> Result<Option<Processor>, CatalogError>;

    /// List all processors.
    fn list_processors(&self) -> Result<Vec<Processor>, CatalogError>;

    /// Seed or refresh a processor record from configuration.
    fn register_processor(&self, processor: &Processor) -> Result<(), CatalogError>;
}
