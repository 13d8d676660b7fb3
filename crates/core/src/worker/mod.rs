//! Collection workers and the pool that feeds them.
//!
//! - [`CollectionWorker`] collects a single artifact and writes the result
//!   back to the catalog. It is called inline for direct dispatch and by the
//!   pool for queued dispatch.
//! - [`CollectionQueue`] is the in-process at-least-once task channel.
//! - [`WorkerPool`] drains the queue with a bounded number of concurrent
//!   collections. A failed item is logged and counted, never fatal.

mod collector_worker;
mod config;
mod pool;
mod queue;

pub use collector_worker::{CollectError, CollectionWorker};
pub use config::WorkerConfig;
pub use pool::{CollectionCompletion, PoolStatus, WorkerPool};
pub use queue::{collection_queue, CollectionQueue, EnqueueOutcome, QueueError, QueueReceiver};
