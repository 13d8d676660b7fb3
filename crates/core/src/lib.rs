pub mod artifact;
pub mod cache;
pub mod catalog;
pub mod collector;
pub mod config;
pub mod dispatch;
pub mod metrics;
pub mod orchestrator;
pub mod processor;
pub mod scheduler;
pub mod testing;
pub mod worker;

pub use artifact::{Artifact, ArtifactFilter, ArtifactKey, ArtifactStatus, CollectionTask};
pub use cache::{CacheConfig, TtlCache};
pub use catalog::{ArtifactCatalog, CachedCatalog, CatalogError, SqliteCatalog};
pub use collector::{
    CollectedContent, Collector, CollectorError, CollectorRegistry, GithubCollector, NpmCollector,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use dispatch::DispatchMode;
pub use orchestrator::{
    AddOutcome, ArtifactTracker, Dispatched, SweepReport, TrackerError, ValidationReport,
};
pub use processor::{CollectorKind, Processor, ProcessorConfig};
pub use scheduler::{SchedulerConfig, SchedulerState, SweepTarget, TrackingScheduler};
pub use worker::{
    collection_queue, CollectError, CollectionQueue, CollectionWorker, EnqueueOutcome,
    WorkerConfig, WorkerPool,
};
