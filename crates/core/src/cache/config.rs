//! Cache configuration.

use serde::{Deserialize, Serialize};

/// Configuration for read caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable caching of catalog reads and collector responses.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Entry lifetime in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Maximum number of entries per cache.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_ttl() -> u64 {
    300 // 5 minutes
}

fn default_max_entries() -> usize {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            ttl_secs: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}
