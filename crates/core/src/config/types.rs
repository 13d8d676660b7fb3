use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::cache::CacheConfig;
use crate::processor::{CollectorKind, ProcessorConfig};
use crate::scheduler::SchedulerConfig;
use crate::worker::WorkerConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub processors: Vec<ProcessorConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tracker.db")
}

/// Sanitized config for API responses (no secrets)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub worker: WorkerConfig,
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub processors: Vec<SanitizedProcessorConfig>,
}

/// Processor entry without setting values, which may hold tokens.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProcessorConfig {
    pub name: String,
    pub direct_collect: bool,
    pub kind: CollectorKind,
    pub setting_keys: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            worker: config.worker.clone(),
            cache: config.cache.clone(),
            scheduler: config.scheduler.clone(),
            processors: config
                .processors
                .iter()
                .map(|p| {
                    let mut setting_keys: Vec<String> = p.settings.keys().cloned().collect();
                    setting_keys.sort();
                    SanitizedProcessorConfig {
                        name: p.name.clone(),
                        direct_collect: p.direct_collect,
                        kind: p.kind,
                        setting_keys,
                    }
                })
                .collect(),
        }
    }
}
