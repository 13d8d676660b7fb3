//! Testing utilities and mock implementations.
//!
//! Mocks for the collector and catalog seams, so the tracker can be driven
//! end to end without network access or a database file.
//!
//! # Example
//!
//! ```rust,ignore
//! use tracker_core::testing::{fixtures, MockCatalog, MockCollector};
//!
//! let catalog = Arc::new(MockCatalog::with_processors(&[fixtures::queued_processor("npm")]));
//! let collector = Arc::new(MockCollector::new());
//! collector.set_versions("react", vec!["18.2.0".into()]);
//! ```

mod mock_catalog;
mod mock_collector;

pub use mock_catalog::MockCatalog;
pub use mock_collector::MockCollector;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::artifact::Artifact;
    use crate::processor::{CollectorKind, Processor};

    /// A processor whose collections go through the queue.
    pub fn queued_processor(name: &str) -> Processor {
        Processor::new(name, CollectorKind::Npm, false)
    }

    /// A processor collected inline by the caller.
    pub fn direct_processor(name: &str) -> Processor {
        Processor::new(name, CollectorKind::Github, true)
    }

    /// An explicitly registered artifact.
    pub fn root_artifact(processor: &str, id: &str) -> Artifact {
        Artifact::new(id, processor, true)
    }

    /// An artifact known only as a dependency.
    pub fn dependency_artifact(processor: &str, id: &str) -> Artifact {
        Artifact::new(id, processor, false)
    }
}
