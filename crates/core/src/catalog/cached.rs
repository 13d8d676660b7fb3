//! Read-through cache in front of an artifact catalog.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{ArtifactCatalog, CatalogError};
use crate::artifact::{Artifact, ArtifactFilter, ArtifactKey, ArtifactStatus};
use crate::cache::{CacheConfig, TtlCache};
use crate::processor::Processor;

/// Memoizes single-key reads; every successful write invalidates its key.
///
/// Only present lookups are cached, so a record created through another
/// catalog handle is never hidden behind a cached miss. A lookup that raced
/// a write through this decorator is returned but not cached.
pub struct CachedCatalog {
    inner: Arc<dyn ArtifactCatalog>,
    artifacts: TtlCache<ArtifactKey, Artifact>,
    processors: TtlCache<String, Processor>,
}

impl CachedCatalog {
    pub fn new(inner: Arc<dyn ArtifactCatalog>, config: &CacheConfig) -> Self {
        Self {
            inner,
            artifacts: TtlCache::from_config(config),
            processors: TtlCache::from_config(config),
        }
    }

    fn invalidate(&self, processor: &str, id: &str) {
        debug!("Invalidating cached artifact {}/{}", processor, id);
        self.artifacts.invalidate(&ArtifactKey::new(processor, id));
    }
}

impl ArtifactCatalog for CachedCatalog {
    fn get_artifact(&self, processor: &str, id: &str) -> Result<Option<Artifact>, CatalogError> {
        let key = ArtifactKey::new(processor, id);
        if let Some(artifact) = self.artifacts.get(&key) {
            return Ok(Some(artifact));
        }

        let since = self.artifacts.generation();
        let artifact = self.inner.get_artifact(processor, id)?;
        if let Some(ref found) = artifact {
            if !self.artifacts.insert_if_unchanged(since, key, found.clone()) {
                debug!("Not caching {}/{}: written during read", processor, id);
            }
        }
        Ok(artifact)
    }

    fn list_artifacts(&self, filter: &ArtifactFilter) -> Result<Vec<Artifact>, CatalogError> {
        self.inner.list_artifacts(filter)
    }

    fn create_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError> {
        let created = self.inner.create_artifact(artifact)?;
        self.invalidate(&artifact.processor, &artifact.id);
        Ok(created)
    }

    fn promote_root(&self, processor: &str, id: &str) -> Result<bool, CatalogError> {
        let changed = self.inner.promote_root(processor, id)?;
        self.invalidate(processor, id);
        Ok(changed)
    }

    fn upsert_artifact(&self, artifact: &Artifact) -> Result<(), CatalogError> {
        self.inner.upsert_artifact(artifact)?;
        self.invalidate(&artifact.processor, &artifact.id);
        Ok(())
    }

    fn update_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError> {
        let updated = self.inner.update_artifact(artifact)?;
        self.invalidate(&artifact.processor, &artifact.id);
        Ok(updated)
    }

    fn count_by_status(&self) -> Result<HashMap<ArtifactStatus, usize>, CatalogError> {
        self.inner.count_by_status()
    }

    fn delete_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError> {
        let deleted = self.inner.delete_artifact(artifact)?;
        self.invalidate(&artifact.processor, &artifact.id);
        Ok(deleted)
    }

    fn get_processor(&self, name: &str) -> Result<Option<Processor>, CatalogError> {
        let key = name.to_string();
        if let Some(processor) = self.processors.get(&key) {
            return Ok(Some(processor));
        }

        let since = self.processors.generation();
        let processor = self.inner.get_processor(name)?;
        if let Some(ref found) = processor {
            self.processors.insert_if_unchanged(since, key, found.clone());
        }
        Ok(processor)
    }

    fn list_processors(&self) -> Result<Vec<Processor>, CatalogError> {
        self.inner.list_processors()
    }

    fn register_processor(&self, processor: &Processor) -> Result<(), CatalogError> {
        self.inner.register_processor(processor)?;
        self.processors.invalidate(&processor.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Mutex;

    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::processor::CollectorKind;

    fn setup() -> (Arc<SqliteCatalog>, CachedCatalog) {
        let inner = Arc::new(SqliteCatalog::in_memory().unwrap());
        let cached = CachedCatalog::new(
            Arc::clone(&inner) as Arc<dyn ArtifactCatalog>,
            &CacheConfig::default(),
        );
        (inner, cached)
    }

    #[test]
    fn test_read_is_memoized() {
        let (inner, cached) = setup();
        cached.create_artifact(&Artifact::new("react", "npm", true)).unwrap();
        assert!(cached.get_artifact("npm", "react").unwrap().is_some());

        // Write behind the cache's back: the memoized copy is still served.
        let mut behind = Artifact::new("react", "npm", true);
        behind.status = ArtifactStatus::Collected;
        inner.upsert_artifact(&behind).unwrap();

        let fetched = cached.get_artifact("npm", "react").unwrap().unwrap();
        assert_eq!(fetched.status, ArtifactStatus::Registered);
    }

    #[test]
    fn test_upsert_invalidates() {
        let (_inner, cached) = setup();
        cached.create_artifact(&Artifact::new("react", "npm", true)).unwrap();
        cached.get_artifact("npm", "react").unwrap();

        let mut updated = Artifact::new("react", "npm", true);
        updated.status = ArtifactStatus::Collected;
        cached.upsert_artifact(&updated).unwrap();

        let fetched = cached.get_artifact("npm", "react").unwrap().unwrap();
        assert_eq!(fetched.status, ArtifactStatus::Collected);
    }

    #[test]
    fn test_promote_invalidates() {
        let (_inner, cached) = setup();
        cached.create_artifact(&Artifact::new("lodash", "npm", false)).unwrap();
        assert!(!cached.get_artifact("npm", "lodash").unwrap().unwrap().root);

        cached.promote_root("npm", "lodash").unwrap();
        assert!(cached.get_artifact("npm", "lodash").unwrap().unwrap().root);
    }

    #[test]
    fn test_delete_invalidates() {
        let (_inner, cached) = setup();
        let artifact = Artifact::new("react", "npm", true);
        cached.create_artifact(&artifact).unwrap();
        cached.get_artifact("npm", "react").unwrap();

        assert!(cached.delete_artifact(&artifact).unwrap());
        assert!(cached.get_artifact("npm", "react").unwrap().is_none());
    }

    #[test]
    fn test_misses_are_not_cached() {
        let (inner, cached) = setup();
        assert!(cached.get_artifact("npm", "react").unwrap().is_none());

        inner.create_artifact(&Artifact::new("react", "npm", true)).unwrap();
        assert!(cached.get_artifact("npm", "react").unwrap().is_some());
    }

    #[test]
    fn test_register_processor_invalidates() {
        let (_inner, cached) = setup();
        cached
            .register_processor(&Processor::new("npm", CollectorKind::Npm, false))
            .unwrap();
        assert!(!cached.get_processor("npm").unwrap().unwrap().direct_collect);

        cached
            .register_processor(&Processor::new("npm", CollectorKind::Npm, true))
            .unwrap();
        assert!(cached.get_processor("npm").unwrap().unwrap().direct_collect);
    }

    /// Pauses the first artifact read after it has hit storage.
    struct PausingCatalog {
        inner: SqliteCatalog,
        paused: Mutex<Option<mpsc::Sender<()>>>,
        resume: Mutex<mpsc::Receiver<()>>,
    }

    impl ArtifactCatalog for PausingCatalog {
        fn get_artifact(&self, processor: &str, id: &str) -> Result<Option<Artifact>, CatalogError> {
            let artifact = self.inner.get_artifact(processor, id)?;
            let paused = self.paused.lock().unwrap().take();
            if let Some(paused) = paused {
                paused.send(()).unwrap();
                self.resume.lock().unwrap().recv().unwrap();
            }
            Ok(artifact)
        }

        fn list_artifacts(&self, filter: &ArtifactFilter) -> Result<Vec<Artifact>, CatalogError> {
            self.inner.list_artifacts(filter)
        }

        fn create_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError> {
            self.inner.create_artifact(artifact)
        }

        fn promote_root(&self, processor: &str, id: &str) -> Result<bool, CatalogError> {
            self.inner.promote_root(processor, id)
        }

        fn upsert_artifact(&self, artifact: &Artifact) -> Result<(), CatalogError> {
            self.inner.upsert_artifact(artifact)
        }

        fn update_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError> {
            self.inner.update_artifact(artifact)
        }

        fn count_by_status(&self) -> Result<HashMap<ArtifactStatus, usize>, CatalogError> {
            self.inner.count_by_status()
        }

        fn delete_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError> {
            self.inner.delete_artifact(artifact)
        }

        fn get_processor(&self, name: &str) -> Result<Option<Processor>, CatalogError> {
            self.inner.get_processor(name)
        }

        fn list_processors(&self) -> Result<Vec<Processor>, CatalogError> {
            self.inner.list_processors()
        }

        fn register_processor(&self, processor: &Processor) -> Result<(), CatalogError> {
            self.inner.register_processor(processor)
        }
    }

    #[test]
    fn test_read_racing_a_write_is_not_cached() {
        let (paused_tx, paused_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        let inner = SqliteCatalog::in_memory().unwrap();
        inner.create_artifact(&Artifact::new("react", "npm", true)).unwrap();

        let cached = CachedCatalog::new(
            Arc::new(PausingCatalog {
                inner,
                paused: Mutex::new(Some(paused_tx)),
                resume: Mutex::new(resume_rx),
            }),
            &CacheConfig::default(),
        );

        std::thread::scope(|scope| {
            let reader = scope.spawn(|| cached.get_artifact("npm", "react").unwrap());

            // The reader holds the old row; write the new one before it resumes.
            paused_rx.recv().unwrap();
            let mut collected = Artifact::new("react", "npm", true);
            collected.status = ArtifactStatus::Collected;
            cached.upsert_artifact(&collected).unwrap();
            resume_tx.send(()).unwrap();

            let stale = reader.join().unwrap().unwrap();
            assert_eq!(stale.status, ArtifactStatus::Registered);
        });

        let fetched = cached.get_artifact("npm", "react").unwrap().unwrap();
        assert_eq!(fetched.status, ArtifactStatus::Collected);
    }

    #[test]
    fn test_update_of_missing_record_does_not_create_it() {
        let (_inner, cached) = setup();
        let mut artifact = Artifact::new("react", "npm", true);
        artifact.status = ArtifactStatus::Collected;

        assert!(!cached.update_artifact(&artifact).unwrap());
        assert!(cached.get_artifact("npm", "react").unwrap().is_none());
    }
}
