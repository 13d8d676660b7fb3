//! Worker pool draining the collection queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::artifact::{Artifact, CollectionTask};

use super::collector_worker::{CollectError, CollectionWorker};
use super::config::WorkerConfig;
use super::queue::QueueReceiver;

/// How long `stop` waits for in-flight collections.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one queued collection, published to subscribers.
#[derive(Debug, Clone)]
pub struct CollectionCompletion {
    pub task: CollectionTask,
    pub result: Result<Artifact, String>,
}

/// Snapshot of pool activity.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub running: bool,
    pub active_jobs: usize,
    pub max_concurrent: usize,
    pub total_processed: u64,
    pub total_failed: u64,
}

#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

/// Drains the collection queue with bounded concurrency.
///
/// A failed collection is logged and counted; the pool keeps going.
pub struct WorkerPool {
    config: WorkerConfig,
    worker: Arc<CollectionWorker>,
    receiver: Mutex<Option<QueueReceiver>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    completion_tx: broadcast::Sender<CollectionCompletion>,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig, worker: Arc<CollectionWorker>, receiver: QueueReceiver) -> Self {
        let max = config.max_concurrent_collections.max(1);
        let (shutdown_tx, _) = broadcast::channel(1);
        let (completion_tx, _) = broadcast::channel(1024);

        Self {
            config,
            worker,
            receiver: Mutex::new(Some(receiver)),
            dispatcher: Mutex::new(None),
            semaphore: Arc::new(Semaphore::new(max)),
            stats: Arc::new(PoolStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            completion_tx,
        }
    }

    /// Subscribe to completed collections.
    ///
    /// Only completions after the call are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<CollectionCompletion> {
        self.completion_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            running: self.is_running(),
            active_jobs: self.stats.active.load(Ordering::Relaxed) as usize,
            max_concurrent: self.config.max_concurrent_collections.max(1),
            total_processed: self.stats.total_processed.load(Ordering::Relaxed),
            total_failed: self.stats.total_failed.load(Ordering::Relaxed),
        }
    }

    /// Start the dispatcher loop.
    ///
    /// The queue receiver is consumed on the first call, so a stopped pool
    /// cannot be restarted.
    pub async fn start(&self) {
        let Some(mut receiver) = self.receiver.lock().await.take() else {
            warn!("Worker pool already started");
            return;
        };

        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(
            "Starting worker pool (max {} concurrent collections)",
            self.config.max_concurrent_collections
        );

        let worker = Arc::clone(&self.worker);
        let semaphore = Arc::clone(&self.semaphore);
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);
        let completion_tx = self.completion_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                let task = tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        info!("Worker pool shutting down");
                        break;
                    }
                    task = receiver.recv() => match task {
                        Some(task) => task,
                        None => {
                            info!("Collection queue closed, worker pool exiting");
                            break;
                        }
                    },
                };

                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let worker = Arc::clone(&worker);
                let stats = Arc::clone(&stats);
                let completion_tx = completion_tx.clone();

                tokio::spawn(async move {
                    stats.active.fetch_add(1, Ordering::Relaxed);
                    let result = worker.collect(&task).await;
                    stats.active.fetch_sub(1, Ordering::Relaxed);
                    stats.total_processed.fetch_add(1, Ordering::Relaxed);

                    let result = match result {
                        Ok(artifact) => {
                            debug!("Queued collection of {} finished", task.key());
                            Ok(artifact)
                        }
                        Err(e @ CollectError::Missing(_)) => {
                            info!("Queued collection of {} skipped: {}", task.key(), e);
                            Err(e.to_string())
                        }
                        Err(e) => {
                            stats.total_failed.fetch_add(1, Ordering::Relaxed);
                            error!("Queued collection of {} failed: {}", task.key(), e);
                            Err(e.to_string())
                        }
                    };

                    // No subscribers is fine.
                    let _ = completion_tx.send(CollectionCompletion { task, result });
                    drop(permit);
                });
            }

            // Tasks still waiting are released here, so later enqueues see a closed queue.
            drop(receiver);
            running.store(false, Ordering::SeqCst);
        });
        *self.dispatcher.lock().await = Some(handle);
    }

    /// Stop taking tasks and wait for in-flight collections to finish.
    pub async fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());

        if let Some(mut handle) = self.dispatcher.lock().await.take() {
            match tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Worker pool dispatcher failed: {}", e),
                Err(_) => {
                    warn!("Worker pool dispatcher did not exit in time, aborting it");
                    handle.abort();
                }
            }
        }

        let max = self.config.max_concurrent_collections.max(1) as u32;
        match tokio::time::timeout(DRAIN_TIMEOUT, self.semaphore.acquire_many(max)).await {
            Ok(Ok(_permits)) => info!("Worker pool stopped"),
            Ok(Err(_)) => {}
            Err(_) => warn!(
                "Worker pool stopped with {} collections still running",
                self.stats.active.load(Ordering::Relaxed)
            ),
        }
        self.running.store(false, Ordering::SeqCst);
    }
}
