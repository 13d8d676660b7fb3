//! Collectors fetch artifact metadata from external ecosystems.
//!
//! Each processor names a collector kind; the [`CollectorRegistry`] resolves
//! a processor name to its collector once per operation.

mod github;
mod npm;
mod types;

#[cfg(test)]
pub(crate) mod test_server;

pub use github::{GithubCollector, GithubRelease};
pub use npm::NpmCollector;
pub use types::*;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::artifact::Artifact;
use crate::cache::CacheConfig;
use crate::processor::{CollectorKind, Processor};

/// Trait for ecosystem collectors.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Name of the collector implementation.
    fn kind(&self) -> &'static str;

    /// Fetch the current metadata for an artifact.
    async fn fetch(&self, artifact: &Artifact) -> Result<CollectedContent, CollectorError>;
}

/// Processor name to collector lookup.
#[derive(Default, Clone)]
pub struct CollectorRegistry {
    collectors: HashMap<String, Arc<dyn Collector>>,
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.collectors.keys().collect();
        names.sort();
        f.debug_struct("CollectorRegistry")
            .field("processors", &names)
            .finish()
    }
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build collectors for every processor whose kind has one.
    pub fn from_processors(
        processors: &[Processor],
        cache: &CacheConfig,
    ) -> Result<Self, CollectorError> {
        let mut registry = Self::new();
        for processor in processors {
            let collector: Arc<dyn Collector> = match processor.kind {
                CollectorKind::Github => Arc::new(GithubCollector::new(processor, cache)?),
                CollectorKind::Npm => Arc::new(NpmCollector::new(processor)?),
                CollectorKind::None => continue,
            };
            info!(
                "Registered {} collector for processor {}",
                collector.kind(),
                processor.name
            );
            registry.register(&processor.name, collector);
        }
        Ok(registry)
    }

    pub fn register(&mut self, processor: impl Into<String>, collector: Arc<dyn Collector>) {
        self.collectors.insert(processor.into(), collector);
    }

    pub fn get(&self, processor: &str) -> Option<Arc<dyn Collector>> {
        self.collectors.get(processor).cloned()
    }

    pub fn contains(&self, processor: &str) -> bool {
        self.collectors.contains_key(processor)
    }
}
