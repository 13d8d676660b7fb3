//! Tracking scheduler.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::orchestrator::{SweepReport, TrackerError};

use super::config::SchedulerConfig;

/// Something the scheduler can sweep.
#[async_trait]
pub trait SweepTarget: Send + Sync {
    async fn sweep(&self) -> Result<SweepReport, TrackerError>;
}

/// Error type for the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
}

/// Whether a scheduler-started sweep is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Firing,
}

/// Parse a cron expression.
pub(crate) fn parse_schedule(expr: &str) -> Result<Schedule, SchedulerError> {
    Schedule::from_str(expr).map_err(|e| SchedulerError::InvalidCron {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

/// Fires a sweep on a cron cadence.
///
/// Each firing runs in its own task, so a slow sweep never delays the timer
/// and two sweeps may overlap. State is `Firing` while any scheduler-started
/// sweep is running and `Idle` otherwise.
pub struct TrackingScheduler {
    schedule: Schedule,
    enabled: bool,
    target: Arc<dyn SweepTarget>,
    active_sweeps: Arc<AtomicUsize>,
    firings: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TrackingScheduler {
    pub fn new(config: &SchedulerConfig, target: Arc<dyn SweepTarget>) -> Result<Self, SchedulerError> {
        let schedule = parse_schedule(&config.cron)?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            schedule,
            enabled: config.enabled,
            target,
            active_sweeps: Arc::new(AtomicUsize::new(0)),
            firings: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        })
    }

    pub fn state(&self) -> SchedulerState {
        if self.active_sweeps.load(Ordering::SeqCst) > 0 {
            SchedulerState::Firing
        } else {
            SchedulerState::Idle
        }
    }

    /// Total sweeps fired, timed or manual.
    pub fn firings(&self) -> u64 {
        self.firings.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Next instant the timer will fire, `None` when disabled.
    pub fn next_firing(&self) -> Option<chrono::DateTime<Utc>> {
        if !self.enabled {
            return None;
        }
        self.schedule.upcoming(Utc).next()
    }

    /// Start the timer loop. Does nothing when disabled or already running.
    pub fn start(&self) {
        if !self.enabled {
            info!("Scheduler disabled, re-track sweeps run only on request");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        let schedule = self.schedule.clone();
        let target = Arc::clone(&self.target);
        let active_sweeps = Arc::clone(&self.active_sweeps);
        let firings = Arc::clone(&self.firings);
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!("Scheduler started");

        tokio::spawn(async move {
            loop {
                let Some(next) = schedule.upcoming(Utc).next() else {
                    warn!("Cron schedule has no upcoming firing, scheduler exiting");
                    break;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scheduler shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {
                        info!("Scheduled re-track firing");
                        fire(&target, &active_sweeps, &firings);
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
        });
    }

    /// Stop the timer loop. Sweeps already running finish on their own.
    pub fn stop(&self) {
        if self.running.load(Ordering::SeqCst) {
            let _ = self.shutdown_tx.send(());
        }
    }

    /// Fire a sweep now, outside the cadence.
    ///
    /// The returned handle resolves when the sweep has dispatched everything.
    pub fn trigger(&self) -> JoinHandle<Result<SweepReport, TrackerError>> {
        info!("Manual re-track firing");
        fire(&self.target, &self.active_sweeps, &self.firings)
    }
}

fn fire(
    target: &Arc<dyn SweepTarget>,
    active_sweeps: &Arc<AtomicUsize>,
    firings: &Arc<AtomicU64>,
) -> JoinHandle<Result<SweepReport, TrackerError>> {
    firings.fetch_add(1, Ordering::SeqCst);
    active_sweeps.fetch_add(1, Ordering::SeqCst);

    let target = Arc::clone(target);
    let active_sweeps = Arc::clone(active_sweeps);

    tokio::spawn(async move {
        let result = target.sweep().await;
        active_sweeps.fetch_sub(1, Ordering::SeqCst);

        match &result {
            Ok(report) => info!(
                "Sweep finished: {}/{} dispatched",
                report.dispatched, report.total
            ),
            Err(e) => error!("Sweep failed: {}", e),
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    /// Counts sweeps; optionally blocks each one until released.
    #[derive(Default)]
    struct CountingTarget {
        sweeps: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl SweepTarget for CountingTarget {
        async fn sweep(&self) -> Result<SweepReport, TrackerError> {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(SweepReport {
                total: 1,
                dispatched: 1,
                failed: Vec::new(),
            })
        }
    }

    fn every_second() -> SchedulerConfig {
        SchedulerConfig {
            enabled: true,
            cron: "* * * * * *".to_string(),
        }
    }

    #[test]
    fn test_invalid_cron_rejected() {
        let config = SchedulerConfig {
            enabled: true,
            cron: "not a schedule".to_string(),
        };
        let result = TrackingScheduler::new(&config, Arc::new(CountingTarget::default()));
        assert!(matches!(result, Err(SchedulerError::InvalidCron { .. })));
    }

    #[test]
    fn test_next_firing_is_in_future() {
        let scheduler =
            TrackingScheduler::new(&SchedulerConfig::default(), Arc::new(CountingTarget::default()))
                .unwrap();
        assert!(scheduler.next_firing().unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_trigger_runs_sweep() {
        let target = Arc::new(CountingTarget::default());
        let scheduler = TrackingScheduler::new(&SchedulerConfig::default(), target.clone()).unwrap();

        let report = scheduler.trigger().await.unwrap().unwrap();
        assert_eq!(report.dispatched, 1);
        assert_eq!(target.sweeps.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.firings(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_state_firing_while_sweep_runs_and_overlap_allowed() {
        let gate = Arc::new(Notify::new());
        let target = Arc::new(CountingTarget {
            sweeps: AtomicUsize::new(0),
            gate: Some(gate.clone()),
        });
        let scheduler = TrackingScheduler::new(&SchedulerConfig::default(), target.clone()).unwrap();

        let first = scheduler.trigger();
        let second = scheduler.trigger();
        assert_eq!(scheduler.state(), SchedulerState::Firing);

        while target.sweeps.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        gate.notify_waiters();

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_timer_fires_and_stops() {
        let target = Arc::new(CountingTarget::default());
        let scheduler = TrackingScheduler::new(&every_second(), target.clone()).unwrap();

        scheduler.start();
        assert!(scheduler.is_running());

        tokio::time::timeout(Duration::from_secs(5), async {
            while target.sweeps.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .unwrap();

        scheduler.stop();
        tokio::time::timeout(Duration::from_secs(2), async {
            while scheduler.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_disabled_scheduler_does_not_start() {
        let config = SchedulerConfig {
            enabled: false,
            ..Default::default()
        };
        let scheduler = TrackingScheduler::new(&config, Arc::new(CountingTarget::default())).unwrap();

        scheduler.start();
        assert!(!scheduler.is_running());
        assert!(scheduler.next_firing().is_none());
    }
}
