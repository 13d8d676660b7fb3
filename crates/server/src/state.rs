use std::sync::Arc;
use tracker_core::{ArtifactTracker, Config, SanitizedConfig, TrackingScheduler, WorkerPool};

/// Shared application state
pub struct AppState {
    config: Config,
    tracker: Arc<ArtifactTracker>,
    scheduler: Arc<TrackingScheduler>,
    pool: Option<Arc<WorkerPool>>,
}

impl AppState {
    pub fn new(
        config: Config,
        tracker: Arc<ArtifactTracker>,
        scheduler: Arc<TrackingScheduler>,
        pool: Option<Arc<WorkerPool>>,
    ) -> Self {
        Self {
            config,
            tracker,
            scheduler,
            pool,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn tracker(&self) -> &ArtifactTracker {
        self.tracker.as_ref()
    }

    pub fn scheduler(&self) -> &TrackingScheduler {
        self.scheduler.as_ref()
    }

    /// The worker pool, when this process drains the queue.
    pub fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_deref()
    }
}
