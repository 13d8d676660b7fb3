//! Tracked artifacts and the collection work that refreshes them.

mod types;

pub use types::{Artifact, ArtifactFilter, ArtifactKey, ArtifactStatus, CollectionTask};
