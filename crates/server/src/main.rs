use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tracker_core::{
    collection_queue, load_config, validate_config, ArtifactCatalog, ArtifactTracker,
    CachedCatalog, CollectionWorker, CollectorRegistry, Processor, SqliteCatalog,
    TrackingScheduler, WorkerPool,
};
use tracker_server::api::create_router;
use tracker_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("TRACKER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Configuration loaded successfully (hash {})", &config_hash[..16]);
    info!("Database path: {:?}", config.database.path);

    // Create SQLite catalog and seed processors from config
    let sqlite = Arc::new(
        SqliteCatalog::new(&config.database.path).context("Failed to create artifact catalog")?,
    );
    let processors: Vec<Processor> = config.processors.iter().map(Processor::from).collect();
    for processor in &processors {
        sqlite
            .register_processor(processor)
            .with_context(|| format!("Failed to register processor {}", processor.name))?;
        info!(
            "Processor {} ({}, {})",
            processor.name,
            processor.kind.as_str(),
            if processor.direct_collect {
                "direct"
            } else {
                "queued"
            }
        );
    }

    let catalog: Arc<dyn ArtifactCatalog> = if config.cache.enabled {
        info!("Catalog read cache enabled (ttl {}s)", config.cache.ttl_secs);
        Arc::new(CachedCatalog::new(sqlite, &config.cache))
    } else {
        sqlite as Arc<dyn ArtifactCatalog>
    };

    // Collectors, worker and queue
    let collectors = CollectorRegistry::from_processors(&processors, &config.cache)
        .context("Failed to create collectors")?;
    let worker = Arc::new(CollectionWorker::new(
        Arc::clone(&catalog),
        collectors,
        &config.worker,
    ));
    let (queue, receiver) = collection_queue(config.worker.queue_capacity);

    let pool = Arc::new(WorkerPool::new(
        config.worker.clone(),
        Arc::clone(&worker),
        receiver,
    ));
    pool.start().await;

    // Tracker and scheduler
    let tracker = Arc::new(
        ArtifactTracker::new(catalog, worker, queue)
            .with_sweep_concurrency(config.worker.max_concurrent_collections),
    );
    let scheduler = Arc::new(
        TrackingScheduler::new(&config.scheduler, tracker.clone())
            .context("Failed to create scheduler")?,
    );
    scheduler.start();
    if let Some(next) = scheduler.next_firing() {
        info!("Next scheduled re-track at {}", next);
    }

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        tracker,
        Arc::clone(&scheduler),
        Some(Arc::clone(&pool)),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    scheduler.stop();
    pool.stop().await;
    info!("Worker pool stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
