use std::collections::HashSet;

use super::{types::Config, ConfigError};
use crate::scheduler::parse_schedule;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Worker pool and queue are not empty, collect timeout is not 0
/// - Processor names are present and unique
/// - Scheduler cron expression parses
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Worker validation
    if config.worker.max_concurrent_collections == 0 {
        return Err(ConfigError::ValidationError(
            "worker.max_concurrent_collections cannot be 0".to_string(),
        ));
    }
    if config.worker.queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "worker.queue_capacity cannot be 0".to_string(),
        ));
    }
    if config.worker.collect_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "worker.collect_timeout_secs cannot be 0".to_string(),
        ));
    }

    // Processor validation
    let mut names = HashSet::new();
    for processor in &config.processors {
        if processor.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "processor name cannot be empty".to_string(),
            ));
        }
        if !names.insert(processor.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate processor name: {}",
                processor.name
            )));
        }
    }

    parse_schedule(&config.scheduler.cron)
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::config::{DatabaseConfig, ServerConfig};
    use crate::processor::ProcessorConfig;
    use crate::scheduler::SchedulerConfig;
    use crate::worker::WorkerConfig;
    use std::net::IpAddr;

    fn processor(name: &str) -> ProcessorConfig {
        toml::from_str(&format!("name = \"{}\"", name)).unwrap()
    }

    fn valid_config() -> Config {
        Config {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            worker: WorkerConfig::default(),
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig::default(),
            processors: vec![processor("npm"), processor("release-repo")],
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..valid_config()
        };
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_workers_fails() {
        let config = Config {
            worker: WorkerConfig::default().with_max_concurrent(0),
            ..valid_config()
        };
        assert!(validate_config(&config).is_err());

        let config = Config {
            worker: WorkerConfig::default().with_queue_capacity(0),
            ..valid_config()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_collect_timeout_fails() {
        let config = Config {
            worker: WorkerConfig::default().with_collect_timeout(0),
            ..valid_config()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("collect_timeout_secs"));
    }

    #[test]
    fn test_validate_duplicate_processor_fails() {
        let config = Config {
            processors: vec![processor("npm"), processor("npm")],
            ..valid_config()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate processor name: npm"));
    }

    #[test]
    fn test_validate_empty_processor_name_fails() {
        let config = Config {
            processors: vec![processor(" ")],
            ..valid_config()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_bad_cron_fails() {
        let config = Config {
            scheduler: SchedulerConfig {
                enabled: true,
                cron: "every tuesday".to_string(),
            },
            ..valid_config()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid cron expression"));
    }
}
