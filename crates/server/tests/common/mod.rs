//! Common test utilities for in-process API testing with mocks.
//!
//! Builds the same wiring as the binary (SQLite catalog, worker, queue,
//! tracker, scheduler) but with a mock collector, so handlers can be driven
//! through the router without network access.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use tracker_core::testing::MockCollector;
use tracker_core::{
    collection_queue, ArtifactCatalog, ArtifactTracker, CacheConfig, CollectionWorker,
    CollectorKind, CollectorRegistry, Config, Processor, ProcessorConfig, SchedulerConfig,
    SqliteCatalog, TrackingScheduler, WorkerConfig, WorkerPool,
};
use tracker_core::config::{DatabaseConfig, ServerConfig};
use tracker_core::worker::QueueReceiver;
use tracker_server::api::create_router;
use tracker_server::state::AppState;

/// Processor collected through the queue.
pub const QUEUED: &str = "npm";
/// Processor collected inline.
pub const DIRECT: &str = "release-repo";

/// Test fixture for driving the API in-process.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock collector shared by both processors
    pub collector: Arc<MockCollector>,
    /// The catalog behind the tracker
    pub catalog: Arc<SqliteCatalog>,
    /// The worker pool, when started
    pub pool: Option<Arc<WorkerPool>>,
    /// Held when no pool drains the queue, so enqueues are still accepted
    _receiver: Option<QueueReceiver>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Options for the fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Start a worker pool draining the queue.
    pub start_pool: bool,
    /// Queue capacity.
    pub queue_capacity: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            start_pool: false,
            queue_capacity: 64,
        }
    }
}

impl TestFixture {
    /// Create a fixture without a running pool; queued work stays queued.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a fixture whose pool drains the queue.
    pub async fn with_pool() -> Self {
        Self::with_config(TestConfig {
            start_pool: true,
            ..Default::default()
        })
        .await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let mut npm_settings = serde_json::Map::new();
        npm_settings.insert(
            "registry_url".to_string(),
            serde_json::json!("http://127.0.0.1:9"),
        );
        npm_settings.insert("token".to_string(), serde_json::json!("secret-token"));

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            worker: WorkerConfig::default()
                .with_max_concurrent(2)
                .with_queue_capacity(test_config.queue_capacity)
                .with_collect_timeout(5),
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig {
                enabled: false,
                ..Default::default()
            },
            processors: vec![
                ProcessorConfig {
                    name: QUEUED.to_string(),
                    direct_collect: false,
                    kind: CollectorKind::Npm,
                    settings: npm_settings,
                },
                ProcessorConfig {
                    name: DIRECT.to_string(),
                    direct_collect: true,
                    kind: CollectorKind::Github,
                    settings: serde_json::Map::new(),
                },
            ],
        };

        let catalog = Arc::new(SqliteCatalog::new(&db_path).expect("Failed to create catalog"));
        for processor in config.processors.iter().map(Processor::from) {
            catalog
                .register_processor(&processor)
                .expect("Failed to register processor");
        }

        let collector = Arc::new(MockCollector::new());
        let mut collectors = CollectorRegistry::new();
        collectors.register(QUEUED, collector.clone());
        collectors.register(DIRECT, collector.clone());

        let dyn_catalog: Arc<dyn ArtifactCatalog> = catalog.clone();
        let worker = Arc::new(CollectionWorker::new(
            Arc::clone(&dyn_catalog),
            collectors,
            &config.worker,
        ));
        let (queue, receiver) = collection_queue(config.worker.queue_capacity);

        let (pool, receiver) = if test_config.start_pool {
            let pool = Arc::new(WorkerPool::new(
                config.worker.clone(),
                Arc::clone(&worker),
                receiver,
            ));
            pool.start().await;
            (Some(pool), None)
        } else {
            (None, Some(receiver))
        };

        let tracker = Arc::new(ArtifactTracker::new(dyn_catalog, worker, queue));
        let scheduler = Arc::new(
            TrackingScheduler::new(&config.scheduler, tracker.clone())
                .expect("Failed to create scheduler"),
        );

        let state = Arc::new(AppState::new(
            config,
            tracker,
            scheduler,
            pool.clone(),
        ));
        let router = create_router(state);

        Self {
            router,
            collector,
            catalog,
            pool,
            _receiver: receiver,
            temp_dir,
        }
    }

    /// Send a GET request
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Send a POST request with a JSON body
    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Send a POST request without a body
    pub async fn post_empty(&self, uri: &str) -> TestResponse {
        self.request(Request::post(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Send a DELETE request
    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Fetch the raw body of a GET request as text
    pub async fn get_text(&self, uri: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, body }
    }

    /// Poll an artifact until its status matches or the timeout elapses.
    pub async fn wait_for_status(&self, processor: &str, id: &str, status: &str) -> bool {
        let uri = format!("/api/v1/artifacts/{}/{}", processor, id);
        for _ in 0..100 {
            let response = self.get(&uri).await;
            if response.body["status"] == status {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}
