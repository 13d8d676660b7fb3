//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the tracker server:
//! - HTTP request metrics (latency, counts)
//! - Artifact counts by status (collected dynamically)
//! - Worker pool and scheduler status (collected dynamically)
//!
//! Core metrics (collections, dispatches, sweeps) are registered from
//! `tracker_core::metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use tracker_core::SchedulerState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tracker_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tracker_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tracker_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Catalog Metrics (collected dynamically)
// =============================================================================

/// Artifacts by current status.
pub static ARTIFACTS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("tracker_artifacts_by_status", "Current artifact count by status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Worker / Scheduler Metrics (collected dynamically)
// =============================================================================

/// Collections currently running in the worker pool.
pub static WORKER_POOL_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tracker_worker_pool_active",
        "Number of collections currently running",
    )
    .unwrap()
});

/// Scheduler firing state (1 = a sweep is running, 0 = idle).
pub static SCHEDULER_FIRING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tracker_scheduler_firing",
        "Whether a scheduled sweep is running (1) or idle (0)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Catalog
    registry
        .register(Box::new(ARTIFACTS_BY_STATUS.clone()))
        .unwrap();

    // Worker / scheduler
    registry
        .register(Box::new(WORKER_POOL_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(SCHEDULER_FIRING.clone()))
        .unwrap();

    // Core metrics (collections, dispatch, sweeps, queue)
    for metric in tracker_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the catalog, pool and scheduler
/// at scrape time.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Some(pool) = state.pool() {
        WORKER_POOL_ACTIVE.set(pool.status().active_jobs as i64);
    }

    SCHEDULER_FIRING.set(match state.scheduler().state() {
        SchedulerState::Firing => 1,
        SchedulerState::Idle => 0,
    });

    match state.tracker().count_by_status().await {
        Ok(counts) => {
            for (status, count) in counts {
                ARTIFACTS_BY_STATUS
                    .with_label_values(&[status.as_str()])
                    .set(count as i64);
            }
        }
        Err(e) => tracing::warn!("Failed to count artifacts for metrics: {}", e),
    }
}
