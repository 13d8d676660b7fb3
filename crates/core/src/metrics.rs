//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Collection (results and durations per processor)
//! - Dispatch (direct vs queued)
//! - Sweeps (re-track and validate passes, per-item failures)
//! - Queue depth

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Collection Metrics
// =============================================================================

/// Collections total by processor and result.
pub static COLLECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tracker_collections_total", "Total artifact collections"),
        &["processor", "result"], // result: "collected", "failed"
    )
    .unwrap()
});

/// Collection duration in seconds.
pub static COLLECTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tracker_collection_duration_seconds",
            "Duration of a single artifact collection",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["processor"],
    )
    .unwrap()
});

// =============================================================================
// Dispatch Metrics
// =============================================================================

/// Dispatches total by mode.
pub static DISPATCH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tracker_dispatch_total", "Total collection dispatches"),
        &["mode"], // "direct", "queued", "coalesced"
    )
    .unwrap()
});

/// Collection tasks waiting in the queue.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tracker_queue_depth",
        "Number of collection tasks waiting for a worker",
    )
    .unwrap()
});

// =============================================================================
// Sweep Metrics
// =============================================================================

/// Sweeps total by kind.
pub static SWEEPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tracker_sweeps_total", "Total catalog sweeps"),
        &["kind"], // "retrack", "validate"
    )
    .unwrap()
});

/// Items that failed inside a sweep.
pub static SWEEP_ITEM_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tracker_sweep_item_failures_total",
            "Artifacts that failed during a sweep",
        ),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(COLLECTIONS_TOTAL.clone()),
        Box::new(COLLECTION_DURATION.clone()),
        Box::new(DISPATCH_TOTAL.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(SWEEPS_TOTAL.clone()),
        Box::new(SWEEP_ITEM_FAILURES.clone()),
    ]
}
