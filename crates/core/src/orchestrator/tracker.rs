//! The artifact tracker.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::artifact::{Artifact, ArtifactFilter, ArtifactKey, ArtifactStatus, CollectionTask};
use crate::catalog::ArtifactCatalog;
use crate::collector::apply_filter;
use crate::dispatch::{self, DispatchMode};
use crate::metrics;
use crate::processor::Processor;
use crate::scheduler::SweepTarget;
use crate::worker::{CollectionQueue, CollectionWorker};

use super::types::{AddOutcome, Dispatched, SweepReport, TrackerError, ValidationReport};

/// Dispatches in flight at once during a sweep.
const DEFAULT_SWEEP_CONCURRENCY: usize = 8;

/// Turns add/track/sweep requests into catalog writes and collection work.
///
/// Holds no artifact state of its own. Every decision is made against the
/// catalog, and the direct/queued choice always goes through
/// [`dispatch::decide`] so every entry point agrees for a given processor.
pub struct ArtifactTracker {
    catalog: Arc<dyn ArtifactCatalog>,
    worker: Arc<CollectionWorker>,
    queue: CollectionQueue,
    sweep_concurrency: usize,
}

impl ArtifactTracker {
    pub fn new(
        catalog: Arc<dyn ArtifactCatalog>,
        worker: Arc<CollectionWorker>,
        queue: CollectionQueue,
    ) -> Self {
        Self {
            catalog,
            worker,
            queue,
            sweep_concurrency: DEFAULT_SWEEP_CONCURRENCY,
        }
    }

    /// Sets how many dispatches a sweep runs at once.
    pub fn with_sweep_concurrency(mut self, concurrency: usize) -> Self {
        self.sweep_concurrency = concurrency.max(1);
        self
    }

    /// Register an artifact.
    ///
    /// `candidate.root` is the requested root flag. A new record is created
    /// as `Registered`; an existing non-root record is promoted when root is
    /// requested. Only the call that actually created or promoted the record
    /// dispatches collection, so concurrent adds of the same key do the work
    /// once. Anything else is `AlreadyExists` with no side effects.
    ///
    /// If dispatch of a newly created record fails, the record is removed
    /// again so the caller can retry. A failed dispatch after a promotion
    /// keeps the promotion; the next sweep collects it.
    pub async fn add_artifact(&self, candidate: Artifact) -> Result<AddOutcome, TrackerError> {
        let processor = self.processor(&candidate.processor)?;
        let key = candidate.key();

        let mut existing = match self.catalog.get_artifact(&key.processor, &key.id)? {
            Some(existing) => existing,
            None => {
                if self.catalog.create_artifact(&candidate)? {
                    info!("Added {} (root: {})", key, candidate.root);
                    let dispatched = match self.dispatch(&processor, candidate.clone(), false).await {
                        Ok(dispatched) => dispatched,
                        Err(e) => {
                            self.roll_back_add(&processor, &candidate);
                            return Err(e);
                        }
                    };
                    return Ok(AddOutcome::Added {
                        artifact: dispatched_artifact(&dispatched, candidate),
                        dispatched,
                    });
                }
                // Another caller created it first.
                self.catalog
                    .get_artifact(&key.processor, &key.id)?
                    .ok_or_else(|| {
                        TrackerError::OperationFailure(format!("{} changed concurrently", key))
                    })?
            }
        };

        if candidate.root && !existing.root {
            if self.catalog.promote_root(&key.processor, &key.id)? {
                existing.root = true;
                info!("Promoted {} to root", key);
                let dispatched = self.dispatch(&processor, existing.clone(), false).await?;
                return Ok(AddOutcome::Promoted {
                    artifact: dispatched_artifact(&dispatched, existing),
                    dispatched,
                });
            }
            existing.root = true;
        }

        debug!("{} already exists", key);
        Ok(AddOutcome::AlreadyExists(existing))
    }

    /// Re-collect a single artifact.
    ///
    /// Success means the work was accepted. For a queued processor the
    /// record is marked `Queued` and completion shows up later as a status
    /// change.
    pub async fn track(&self, processor: &str, id: &str) -> Result<Dispatched, TrackerError> {
        let artifact = self.get_artifact(processor, id).await?;
        let processor = self.processor(processor)?;
        self.dispatch(&processor, artifact, true).await
    }

    /// Dispatch a track for every artifact in the catalog.
    ///
    /// Returns once every dispatch has been accepted or has failed. A failed
    /// item is logged and reported; the rest of the sweep continues.
    pub async fn retrack(&self) -> Result<SweepReport, TrackerError> {
        let artifacts = self.catalog.list_artifacts(&ArtifactFilter::new())?;
        let processors = self.resolve_processors(&artifacts)?;
        metrics::SWEEPS_TOTAL.with_label_values(&["retrack"]).inc();
        info!("Re-tracking {} artifacts", artifacts.len());

        let mut report = SweepReport {
            total: artifacts.len(),
            ..Default::default()
        };

        let processors = &processors;
        let results: Vec<(ArtifactKey, Result<Dispatched, TrackerError>)> =
            stream::iter(artifacts)
                .map(|artifact| async move {
                    let key = artifact.key();
                    let result = match processors.get(&artifact.processor) {
                        Some(Some(processor)) => self.dispatch(processor, artifact, true).await,
                        _ => Err(TrackerError::UnknownProcessor(artifact.processor.clone())),
                    };
                    (key, result)
                })
                .buffer_unordered(self.sweep_concurrency)
                .collect()
                .await;

        for (key, result) in results {
            match result {
                Ok(_) => report.dispatched += 1,
                Err(e) => {
                    warn!("Re-track of {} failed: {}", key, e);
                    metrics::SWEEP_ITEM_FAILURES
                        .with_label_values(&["retrack"])
                        .inc();
                    report.failed.push((key, e.to_string()));
                }
            }
        }

        info!(
            "Re-track sweep done: {} dispatched, {} failed",
            report.dispatched,
            report.failed.len()
        );
        Ok(report)
    }

    /// Check that every artifact still resolves against its processor.
    ///
    /// Never collects. Artifacts that no longer resolve are marked `Failed`
    /// with the reason.
    pub async fn validate(&self) -> Result<ValidationReport, TrackerError> {
        let artifacts = self.catalog.list_artifacts(&ArtifactFilter::new())?;
        let processors = self.resolve_processors(&artifacts)?;
        metrics::SWEEPS_TOTAL.with_label_values(&["validate"]).inc();
        info!("Validating {} artifacts", artifacts.len());

        let mut report = ValidationReport::default();
        for artifact in artifacts {
            report.checked += 1;
            let key = artifact.key();

            let Some(reason) = self.validation_problem(&artifact, &processors) else {
                report.valid += 1;
                continue;
            };

            warn!("{} is invalid: {}", key, reason);
            metrics::SWEEP_ITEM_FAILURES
                .with_label_values(&["validate"])
                .inc();

            if artifact.status != ArtifactStatus::Failed
                || artifact.last_error.as_deref() != Some(reason.as_str())
            {
                let mut failed = artifact;
                failed.status = ArtifactStatus::Failed;
                failed.last_error = Some(reason.clone());
                match self.catalog.update_artifact(&failed) {
                    Ok(true) => {}
                    Ok(false) => debug!("{} was deleted during validation", key),
                    Err(e) => warn!("Failed to mark {} as failed: {}", key, e),
                }
            }
            report.invalid.push((key, reason));
        }

        info!(
            "Validation done: {} valid, {} invalid",
            report.valid,
            report.invalid.len()
        );
        Ok(report)
    }

    /// Remove an artifact. Returns the removed record.
    pub async fn delete_artifact(&self, processor: &str, id: &str) -> Result<Artifact, TrackerError> {
        let artifact = self.get_artifact(processor, id).await?;
        let key = artifact.key();

        match self.catalog.delete_artifact(&artifact) {
            Ok(true) => {
                info!("Deleted {}", key);
                Ok(artifact)
            }
            Ok(false) => Err(TrackerError::OperationFailure(format!(
                "{} was not removed",
                key
            ))),
            Err(e) => Err(TrackerError::OperationFailure(format!(
                "Failed to delete {}: {}",
                key, e
            ))),
        }
    }

    /// Collect inline, whatever the processor's dispatch mode.
    ///
    /// The artifact does not need to exist; an unknown id is created as a
    /// non-root record. This is the only entry point allowed to create a
    /// record from a collection task.
    pub async fn collect(&self, processor: &str, id: &str) -> Result<Artifact, TrackerError> {
        let task = match self.catalog.get_artifact(processor, id)? {
            Some(artifact) => CollectionTask::for_artifact(&artifact),
            None => CollectionTask::new(id, processor),
        }
        .create_if_missing();

        metrics::DISPATCH_TOTAL
            .with_label_values(&[DispatchMode::Direct.as_str()])
            .inc();
        self.worker
            .collect(&task)
            .await
            .map_err(|e| TrackerError::from_collect(task.key(), e))
    }

    pub async fn get_artifact(&self, processor: &str, id: &str) -> Result<Artifact, TrackerError> {
        self.catalog
            .get_artifact(processor, id)?
            .ok_or_else(|| TrackerError::NotFound(ArtifactKey::new(processor, id)))
    }

    pub async fn list_artifacts(&self, filter: &ArtifactFilter) -> Result<Vec<Artifact>, TrackerError> {
        Ok(self.catalog.list_artifacts(filter)?)
    }

    pub async fn list_processors(&self) -> Result<Vec<Processor>, TrackerError> {
        Ok(self.catalog.list_processors()?)
    }

    /// Artifact counts per status, every status included.
    pub async fn count_by_status(&self) -> Result<Vec<(ArtifactStatus, usize)>, TrackerError> {
        let counts = self.catalog.count_by_status()?;
        Ok(ArtifactStatus::ALL
            .iter()
            .map(|status| (*status, counts.get(status).copied().unwrap_or(0)))
            .collect())
    }

    /// Undo the create of an add whose dispatch failed.
    ///
    /// A direct collection that failed has already recorded `Failed` with
    /// the reason, which is kept; only a refused enqueue is rolled back.
    fn roll_back_add(&self, processor: &Processor, artifact: &Artifact) {
        if dispatch::decide(processor) != DispatchMode::Queued {
            return;
        }
        let key = artifact.key();
        match self.catalog.delete_artifact(artifact) {
            Ok(_) => info!("Rolled back add of {} after failed dispatch", key),
            Err(e) => warn!("Failed to roll back add of {}: {}", key, e),
        }
    }

    fn processor(&self, name: &str) -> Result<Processor, TrackerError> {
        self.catalog
            .get_processor(name)?
            .ok_or_else(|| TrackerError::UnknownProcessor(name.to_string()))
    }

    /// Look up each distinct processor once for a sweep.
    fn resolve_processors(
        &self,
        artifacts: &[Artifact],
    ) -> Result<HashMap<String, Option<Processor>>, TrackerError> {
        let mut processors = HashMap::new();
        for artifact in artifacts {
            if !processors.contains_key(&artifact.processor) {
                let processor = self.catalog.get_processor(&artifact.processor)?;
                processors.insert(artifact.processor.clone(), processor);
            }
        }
        Ok(processors)
    }

    fn validation_problem(
        &self,
        artifact: &Artifact,
        processors: &HashMap<String, Option<Processor>>,
    ) -> Option<String> {
        if !matches!(processors.get(&artifact.processor), Some(Some(_))) {
            return Some(format!("Processor {} is not registered", artifact.processor));
        }
        if !self.worker.has_collector(&artifact.processor) {
            return Some(format!(
                "No collector registered for processor {}",
                artifact.processor
            ));
        }
        if let Err(e) = apply_filter(Vec::new(), artifact.filter.as_deref()) {
            return Some(e.to_string());
        }
        None
    }

    /// Hand collection work for one artifact to the worker or the queue.
    ///
    /// With `mark_queued`, a queued dispatch first records `Queued` and
    /// `last_tracked_at`; the previous record is restored if the queue
    /// refuses the task.
    async fn dispatch(
        &self,
        processor: &Processor,
        artifact: Artifact,
        mark_queued: bool,
    ) -> Result<Dispatched, TrackerError> {
        let key = artifact.key();
        let task = CollectionTask::for_artifact(&artifact);

        let mode = dispatch::decide(processor);
        match mode {
            DispatchMode::Direct => {
                // Queued dispatches are counted by the queue, with coalescing.
                metrics::DISPATCH_TOTAL.with_label_values(&[mode.as_str()]).inc();
                let artifact = self
                    .worker
                    .collect(&task)
                    .await
                    .map_err(|e| TrackerError::from_collect(key, e))?;
                Ok(Dispatched::Collected { artifact })
            }
            DispatchMode::Queued => {
                if mark_queued {
                    let mut queued = artifact.clone();
                    queued.status = ArtifactStatus::Queued;
                    queued.last_tracked_at = Some(Utc::now());
                    if !self.catalog.update_artifact(&queued)? {
                        return Err(TrackerError::NotFound(key));
                    }
                }

                match self.queue.enqueue(task) {
                    Ok(outcome) => {
                        debug!("Queued collection of {} ({:?})", key, outcome);
                        Ok(Dispatched::Queued { outcome })
                    }
                    Err(e) => {
                        if mark_queued {
                            if let Err(restore) = self.catalog.update_artifact(&artifact) {
                                warn!("Failed to restore {} after rejected enqueue: {}", key, restore);
                            }
                        }
                        Err(TrackerError::DispatchFailure {
                            key,
                            reason: e.to_string(),
                        })
                    }
                }
            }
        }
    }
}

fn dispatched_artifact(dispatched: &Dispatched, fallback: Artifact) -> Artifact {
    match dispatched {
        Dispatched::Collected { artifact } => artifact.clone(),
        Dispatched::Queued { .. } => fallback,
    }
}

#[async_trait]
impl SweepTarget for ArtifactTracker {
    async fn sweep(&self) -> Result<SweepReport, TrackerError> {
        self.retrack().await
    }
}
