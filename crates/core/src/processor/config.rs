//! Processor entries in the configuration file.

use serde::{Deserialize, Serialize};

use super::types::{CollectorKind, Processor};

/// One `[[processors]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Unique processor name.
    pub name: String,

    /// Collect synchronously on registration/track instead of queuing.
    #[serde(default)]
    pub direct_collect: bool,

    /// Collector implementation to use.
    #[serde(default)]
    pub kind: CollectorKind,

    /// Collector-specific settings (api_url, token, per_page, ...).
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl From<&ProcessorConfig> for Processor {
    fn from(config: &ProcessorConfig) -> Self {
        Processor {
            name: config.name.clone(),
            direct_collect: config.direct_collect,
            kind: config.kind,
            settings: config.settings.clone(),
        }
    }
}
