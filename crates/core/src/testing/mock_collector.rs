//! Mock collector for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::artifact::Artifact;
use crate::collector::{apply_filter, CollectedContent, Collector, CollectorError};

/// Mock implementation of the Collector trait.
///
/// Unconfigured artifacts collect successfully with version `1.0.0`.
/// Versions, dependencies, failures and latency can be set per artifact id,
/// and every fetch is recorded for assertions.
///
/// ```rust,ignore
/// let collector = Arc::new(MockCollector::new());
/// collector.set_versions("react", vec!["18.2.0".into()]);
/// collector.fail_for("broken", "registry unavailable");
///
/// let mut registry = CollectorRegistry::new();
/// registry.register("npm", collector.clone());
/// // ... collect ...
/// assert_eq!(collector.fetch_count("react"), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockCollector {
    versions: Mutex<HashMap<String, Vec<String>>>,
    dependencies: Mutex<HashMap<String, Vec<String>>>,
    failures: Mutex<HashMap<String, String>>,
    delay: Mutex<Option<Duration>>,
    fetches: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Versions returned for the artifact.
    pub fn set_versions(&self, id: &str, versions: Vec<String>) {
        lock(&self.versions).insert(id.to_string(), versions);
    }

    /// Dependencies reported for the artifact.
    pub fn set_dependencies(&self, id: &str, dependencies: Vec<String>) {
        lock(&self.dependencies).insert(id.to_string(), dependencies);
    }

    /// Make every fetch of the artifact fail.
    pub fn fail_for(&self, id: &str, message: &str) {
        lock(&self.failures).insert(id.to_string(), message.to_string());
    }

    /// Stop failing fetches of the artifact.
    pub fn clear_failure(&self, id: &str) {
        lock(&self.failures).remove(id);
    }

    /// Latency added to every fetch.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Ids fetched so far, in call order.
    pub fn fetches(&self) -> Vec<String> {
        lock(&self.fetches).clone()
    }

    pub fn fetch_count(&self, id: &str) -> usize {
        lock(&self.fetches).iter().filter(|f| f.as_str() == id).count()
    }

    pub fn total_fetches(&self) -> usize {
        lock(&self.fetches).len()
    }

    /// Highest number of fetches observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Collector for MockCollector {
    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn fetch(&self, artifact: &Artifact) -> Result<CollectedContent, CollectorError> {
        lock(&self.fetches).push(artifact.id.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(message) = lock(&self.failures).get(&artifact.id).cloned() {
            return Err(CollectorError::Api {
                status: 500,
                message,
            });
        }

        let versions = lock(&self.versions)
            .get(&artifact.id)
            .cloned()
            .unwrap_or_else(|| vec!["1.0.0".to_string()]);
        let dependencies = lock(&self.dependencies)
            .get(&artifact.id)
            .cloned()
            .unwrap_or_default();

        Ok(CollectedContent {
            versions: apply_filter(versions, artifact.filter.as_deref())?,
            dependencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_fetch() {
        let collector = MockCollector::new();
        let content = collector
            .fetch(&Artifact::new("anything", "npm", true))
            .await
            .unwrap();

        assert_eq!(content.versions, vec!["1.0.0"]);
        assert!(content.dependencies.is_empty());
        assert_eq!(collector.fetch_count("anything"), 1);
    }

    #[tokio::test]
    async fn test_failure_and_recovery() {
        let collector = MockCollector::new();
        collector.fail_for("x", "down");

        let artifact = Artifact::new("x", "npm", true);
        assert!(collector.fetch(&artifact).await.is_err());

        collector.clear_failure("x");
        assert!(collector.fetch(&artifact).await.is_ok());
        assert_eq!(collector.total_fetches(), 2);
    }

    #[tokio::test]
    async fn test_filter_applied() {
        let collector = MockCollector::new();
        collector.set_versions("lib", vec!["1.0.0".into(), "2.0.0".into()]);

        let artifact = Artifact::new("lib", "npm", true).with_filter(Some("^2\\.".into()));
        let content = collector.fetch(&artifact).await.unwrap();
        assert_eq!(content.versions, vec!["2.0.0"]);
    }
}
