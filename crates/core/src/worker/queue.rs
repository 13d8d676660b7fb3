//! In-process collection queue.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::artifact::{ArtifactKey, CollectionTask};
use crate::dispatch::DispatchMode;
use crate::metrics;

/// Result of a successful enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// A new task was placed on the queue.
    Queued,
    /// A task for the same key is already waiting; nothing was added.
    Coalesced,
}

/// Error type for enqueue.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("Collection queue is full, rejected {0}")]
    Full(ArtifactKey),

    #[error("Collection queue is closed")]
    Closed,
}

/// Keys with a task waiting on the queue.
type Pending = Arc<Mutex<HashSet<ArtifactKey>>>;

/// Sending half of the collection queue.
///
/// Enqueue never waits: a full queue is reported as an error. A task whose key
/// is already waiting is coalesced into the existing one, since a worker
/// reads the catalog record when it starts.
#[derive(Clone)]
pub struct CollectionQueue {
    tx: mpsc::Sender<CollectionTask>,
    pending: Pending,
}

/// Receiving half of the collection queue, owned by the worker pool.
pub struct QueueReceiver {
    rx: mpsc::Receiver<CollectionTask>,
    pending: Pending,
}

/// Create a bounded collection queue.
pub fn collection_queue(capacity: usize) -> (CollectionQueue, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pending: Pending = Arc::new(Mutex::new(HashSet::new()));
    (
        CollectionQueue {
            tx,
            pending: Arc::clone(&pending),
        },
        QueueReceiver { rx, pending },
    )
}

impl CollectionQueue {
    /// Offer a task to the queue.
    pub fn enqueue(&self, task: CollectionTask) -> Result<EnqueueOutcome, QueueError> {
        let key = task.key();
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.contains(&key) {
            metrics::DISPATCH_TOTAL
                .with_label_values(&["coalesced"])
                .inc();
            return Ok(EnqueueOutcome::Coalesced);
        }

        match self.tx.try_send(task) {
            Ok(()) => {
                pending.insert(key);
                metrics::QUEUE_DEPTH.inc();
                metrics::DISPATCH_TOTAL
                    .with_label_values(&[DispatchMode::Queued.as_str()])
                    .inc();
                Ok(EnqueueOutcome::Queued)
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(QueueError::Full(key)),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Number of tasks waiting.
    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if a task for the key is waiting.
    pub fn is_pending(&self, key: &ArtifactKey) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

impl QueueReceiver {
    /// Wait for the next task. Returns `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<CollectionTask> {
        let task = self.rx.recv().await?;
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&task.key());
        metrics::QUEUE_DEPTH.dec();
        Some(task)
    }
}

impl Drop for QueueReceiver {
    fn drop(&mut self) {
        // Refuse new tasks first so nothing lands in `pending` after the clear.
        self.rx.close();
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        metrics::QUEUE_DEPTH.sub(pending.len() as i64);
        pending.clear();

        if dropped > 0 {
            warn!(
                "Collection queue closed with {} tasks never started; they run on the next sweep",
                dropped
            );
        }
    }
}
