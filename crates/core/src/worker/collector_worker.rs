//! Single-artifact collection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::artifact::{Artifact, ArtifactKey, ArtifactStatus, CollectionTask};
use crate::catalog::{ArtifactCatalog, CatalogError};
use crate::collector::{CollectorError, CollectorRegistry};
use crate::metrics;

use super::config::WorkerConfig;

/// Error type for a single collection.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The task names a processor the catalog does not know.
    #[error("Unknown processor: {0}")]
    UnknownProcessor(String),

    /// The processor exists but has no collector.
    #[error("No collector registered for processor: {0}")]
    NoCollector(String),

    /// The artifact was deleted before or during collection.
    #[error("Artifact {0} no longer exists")]
    Missing(ArtifactKey),

    /// The collector failed or timed out.
    #[error("Collection of {key} failed: {source}")]
    Collector {
        key: ArtifactKey,
        #[source]
        source: CollectorError,
    },

    /// Reading or writing the catalog failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Collects one artifact and records the outcome in the catalog.
///
/// Used inline for direct dispatch and by the [`WorkerPool`](super::WorkerPool)
/// for queued dispatch, so both paths share the same status transitions:
/// `Collecting`, then `Collected` or `Failed`.
pub struct CollectionWorker {
    catalog: Arc<dyn ArtifactCatalog>,
    collectors: CollectorRegistry,
    timeout: Duration,
}

impl CollectionWorker {
    pub fn new(
        catalog: Arc<dyn ArtifactCatalog>,
        collectors: CollectorRegistry,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            catalog,
            collectors,
            timeout: Duration::from_secs(config.collect_timeout_secs),
        }
    }

    /// True if a collector is registered for the processor.
    pub fn has_collector(&self, processor: &str) -> bool {
        self.collectors.contains(processor)
    }

    /// Run one collection task to completion.
    ///
    /// A missing artifact is created as non-root from the task snapshot only
    /// when the task asks for it; otherwise it was deleted after the task was
    /// queued and the task is skipped with [`CollectError::Missing`]. Status
    /// writes never recreate a record deleted mid-collection. Dependencies
    /// reported by the collector are created as non-root `Registered`
    /// artifacts of the same processor.
    pub async fn collect(&self, task: &CollectionTask) -> Result<Artifact, CollectError> {
        let key = task.key();

        if self.catalog.get_processor(&task.processor)?.is_none() {
            return Err(CollectError::UnknownProcessor(task.processor.clone()));
        }
        let collector = self
            .collectors
            .get(&task.processor)
            .ok_or_else(|| CollectError::NoCollector(task.processor.clone()))?;

        let mut artifact = match self.catalog.get_artifact(&task.processor, &task.id)? {
            Some(artifact) => artifact,
            None if task.create_if_missing => {
                let artifact = Artifact::new(&task.id, &task.processor, false)
                    .with_filter(task.filter.clone())
                    .with_config(task.config.clone());
                if self.catalog.create_artifact(&artifact)? {
                    artifact
                } else {
                    self.catalog
                        .get_artifact(&task.processor, &task.id)?
                        .ok_or_else(|| CollectError::Missing(key.clone()))?
                }
            }
            None => {
                info!("Skipping collection of {}: artifact was deleted", key);
                return Err(CollectError::Missing(key));
            }
        };

        artifact.status = ArtifactStatus::Collecting;
        if !self.catalog.update_artifact(&artifact)? {
            info!("Skipping collection of {}: artifact was deleted", key);
            return Err(CollectError::Missing(key));
        }

        debug!(
            "Collecting {} with {} collector (task {})",
            key,
            collector.kind(),
            task.task_id
        );

        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, collector.fetch(&artifact)).await {
            Ok(result) => result,
            Err(_) => Err(CollectorError::Timeout(self.timeout.as_secs())),
        };
        metrics::COLLECTION_DURATION
            .with_label_values(&[task.processor.as_str()])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(content) => {
                let now = Utc::now();
                artifact.status = ArtifactStatus::Collected;
                artifact.versions = content.versions;
                artifact.last_error = None;
                artifact.last_collected_at = Some(now);
                artifact.last_tracked_at = Some(now);
                if !self.catalog.update_artifact(&artifact)? {
                    info!("Discarding collection of {}: artifact was deleted", key);
                    return Err(CollectError::Missing(key));
                }

                metrics::COLLECTIONS_TOTAL
                    .with_label_values(&[task.processor.as_str(), "collected"])
                    .inc();
                info!(
                    "Collected {}: {} versions, {} dependencies",
                    key,
                    artifact.versions.len(),
                    content.dependencies.len()
                );

                self.register_dependencies(&task.processor, &task.id, &content.dependencies);
                Ok(artifact)
            }
            Err(e) => {
                artifact.status = ArtifactStatus::Failed;
                artifact.last_error = Some(e.to_string());
                match self.catalog.update_artifact(&artifact) {
                    Ok(true) => {}
                    Ok(false) => debug!("Not recording failure for deleted artifact {}", key),
                    Err(write_err) => {
                        warn!("Failed to record collection failure for {}: {}", key, write_err)
                    }
                }

                metrics::COLLECTIONS_TOTAL
                    .with_label_values(&[task.processor.as_str(), "failed"])
                    .inc();
                warn!("Collection of {} failed: {}", key, e);

                Err(CollectError::Collector { key, source: e })
            }
        }
    }

    fn register_dependencies(&self, processor: &str, parent: &str, dependencies: &[String]) {
        for dep in dependencies.iter().filter(|d| d.as_str() != parent) {
            match self
                .catalog
                .create_artifact(&Artifact::new(dep, processor, false))
            {
                Ok(true) => debug!("Discovered dependency {}/{} of {}", processor, dep, parent),
                Ok(false) => {}
                Err(e) => warn!(
                    "Failed to register dependency {}/{} of {}: {}",
                    processor, dep, parent, e
                ),
            }
        }
    }
}
