//! Worker pool configuration.

use serde::{Deserialize, Serialize};

/// Configuration for collection workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum collections running at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_collections: usize,

    /// Capacity of the collection queue. Enqueue fails when it is full.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Timeout for a single collector call, in seconds.
    #[serde(default = "default_collect_timeout")]
    pub collect_timeout_secs: u64,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_collect_timeout() -> u64 {
    60 // 1 minute
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_collections: default_max_concurrent(),
            queue_capacity: default_queue_capacity(),
            collect_timeout_secs: default_collect_timeout(),
        }
    }
}

impl WorkerConfig {
    /// Sets the maximum concurrent collections.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_collections = max;
        self
    }

    /// Sets the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the collect timeout.
    pub fn with_collect_timeout(mut self, secs: u64) -> Self {
        self.collect_timeout_secs = secs;
        self
    }
}
