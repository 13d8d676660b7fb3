//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the periodic re-track sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the timer runs at all. Manual triggers work either way.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Cron expression, seconds first (`sec min hour day month weekday`).
    #[serde(default = "default_cron")]
    pub cron: String,
}

fn default_enabled() -> bool {
    true
}

fn default_cron() -> String {
    "0 0 */2 * * *".to_string() // every two hours
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            cron: default_cron(),
        }
    }
}
