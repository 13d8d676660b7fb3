//! Mock catalog for testing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::artifact::{Artifact, ArtifactFilter, ArtifactKey, ArtifactStatus};
use crate::catalog::{ArtifactCatalog, CatalogError};
use crate::processor::Processor;

/// In-memory catalog with failure injection.
///
/// Behaves like the SQLite catalog (insert-if-absent create, monotonic `root`)
/// and can be told to fail deletes, lists, or writes to specific keys.
#[derive(Debug, Default)]
pub struct MockCatalog {
    artifacts: Mutex<BTreeMap<ArtifactKey, Artifact>>,
    processors: Mutex<HashMap<String, Processor>>,
    fail_deletes: AtomicBool,
    fail_lists: AtomicBool,
    failing_writes: Mutex<HashSet<ArtifactKey>>,
    writes: AtomicUsize,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog seeded with processors.
    pub fn with_processors(processors: &[Processor]) -> Self {
        let catalog = Self::new();
        for processor in processors {
            lock(&catalog.processors).insert(processor.name.clone(), processor.clone());
        }
        catalog
    }

    /// Make `delete_artifact` fail.
    pub fn set_delete_failure(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make `list_artifacts` fail.
    pub fn set_list_failure(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// Make every write of the given key fail.
    pub fn fail_writes_for(&self, processor: &str, id: &str) {
        lock(&self.failing_writes).insert(ArtifactKey::new(processor, id));
    }

    /// Remove a processor while leaving its artifacts behind.
    pub fn remove_processor(&self, name: &str) {
        lock(&self.processors).remove(name);
    }

    /// Number of full-record writes (`upsert_artifact` and `update_artifact`).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn artifact_count(&self) -> usize {
        lock(&self.artifacts).len()
    }

    fn check_write(&self, key: &ArtifactKey) -> Result<(), CatalogError> {
        if lock(&self.failing_writes).contains(key) {
            return Err(CatalogError::Database(format!("injected write failure for {}", key)));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl ArtifactCatalog for MockCatalog {
    fn get_artifact(&self, processor: &str, id: &str) -> Result<Option<Artifact>, CatalogError> {
        Ok(lock(&self.artifacts)
            .get(&ArtifactKey::new(processor, id))
            .cloned())
    }

    fn list_artifacts(&self, filter: &ArtifactFilter) -> Result<Vec<Artifact>, CatalogError> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(CatalogError::Database("injected list failure".into()));
        }
        Ok(lock(&self.artifacts)
            .values()
            .filter(|a| filter.processor.as_deref().map_or(true, |p| a.processor == p))
            .filter(|a| !filter.only_roots || a.root)
            .cloned()
            .collect())
    }

    fn create_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError> {
        let key = artifact.key();
        self.check_write(&key)?;
        let mut artifacts = lock(&self.artifacts);
        if artifacts.contains_key(&key) {
            return Ok(false);
        }
        artifacts.insert(key, artifact.clone());
        Ok(true)
    }

    fn promote_root(&self, processor: &str, id: &str) -> Result<bool, CatalogError> {
        let key = ArtifactKey::new(processor, id);
        self.check_write(&key)?;
        let mut artifacts = lock(&self.artifacts);
        let artifact = artifacts
            .get_mut(&key)
            .ok_or_else(|| CatalogError::NotFound(key.to_string()))?;
        if artifact.root {
            return Ok(false);
        }
        artifact.root = true;
        Ok(true)
    }

    fn upsert_artifact(&self, artifact: &Artifact) -> Result<(), CatalogError> {
        let key = artifact.key();
        self.check_write(&key)?;
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut artifacts = lock(&self.artifacts);
        let mut record = artifact.clone();
        if let Some(existing) = artifacts.get(&key) {
            record.root = record.root || existing.root;
        }
        artifacts.insert(key, record);
        Ok(())
    }

    fn update_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError> {
        let key = artifact.key();
        self.check_write(&key)?;
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut artifacts = lock(&self.artifacts);
        let Some(existing) = artifacts.get_mut(&key) else {
            return Ok(false);
        };
        let root = existing.root || artifact.root;
        *existing = artifact.clone();
        existing.root = root;
        Ok(true)
    }

    fn count_by_status(&self) -> Result<HashMap<ArtifactStatus, usize>, CatalogError> {
        let mut counts = HashMap::new();
        for artifact in lock(&self.artifacts).values() {
            *counts.entry(artifact.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn delete_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CatalogError::Database("injected delete failure".into()));
        }
        Ok(lock(&self.artifacts).remove(&artifact.key()).is_some())
    }

    fn get_processor(&self, name: &str) -> Result<Option<Processor>, CatalogError> {
        Ok(lock(&self.processors).get(name).cloned())
    }

    fn list_processors(&self) -> Result<Vec<Processor>, CatalogError> {
        let mut processors: Vec<Processor> = lock(&self.processors).values().cloned().collect();
        processors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(processors)
    }

    fn register_processor(&self, processor: &Processor) -> Result<(), CatalogError> {
        lock(&self.processors).insert(processor.name.clone(), processor.clone());
        Ok(())
    }
}
