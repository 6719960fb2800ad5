// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vitrina serve` command implementation.
//!
//! Opens the catalog database, picks the cache backend, builds the
//! WhatsApp and inference clients, then runs the agent loop, the timeout
//! worker and the webhook server until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vitrina_agent::{
    Adapters, AgentLoop, AlbumAggregator, AlbumSettings, ConversationPipeline, IdempotencyGuard,
    SessionStore, TimeoutWorker, shutdown,
};
use vitrina_config::VitrinaConfig;
use vitrina_core::{CacheAdapter, VitrinaError};
use vitrina_gateway::GatewayState;
use vitrina_openai::{OpenAiEnricher, OpenAiProvider};
use vitrina_storage::{Database, MemoryCache, SqliteCache, SqliteCatalog};
use vitrina_whatsapp::WhatsAppClient;

/// Capacity of the queue between the webhook and the agent loop.
const INBOUND_QUEUE: usize = 256;

/// How often expired cache entries are purged.
const PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// The configured cache, kept concrete for housekeeping.
#[derive(Clone)]
enum CacheBackend {
    Sqlite(Arc<SqliteCache>),
    Memory(Arc<MemoryCache>),
}

impl CacheBackend {
    fn adapter(&self) -> Arc<dyn CacheAdapter> {
        match self {
            Self::Sqlite(cache) => cache.clone(),
            Self::Memory(cache) => cache.clone(),
        }
    }

    async fn purge_expired(&self) -> Result<usize, VitrinaError> {
        match self {
            Self::Sqlite(cache) => cache.purge_expired().await,
            Self::Memory(cache) => Ok(cache.purge_expired()),
        }
    }
}

pub async fn run_serve(config: VitrinaConfig) -> Result<(), VitrinaError> {
    init_tracing(&config.agent.log_level);
    info!(agent = %config.agent.name, "starting vitrina serve");

    let db = Arc::new(Database::open(&config.storage.database_path, config.storage.wal_mode).await?);
    info!(path = %config.storage.database_path, "catalog database ready");

    let backend = match config.storage.cache_backend.as_str() {
        "memory" => CacheBackend::Memory(Arc::new(MemoryCache::new())),
        _ => CacheBackend::Sqlite(Arc::new(SqliteCache::new(db.clone()))),
    };
    info!(backend = %config.storage.cache_backend, "cache initialized");

    let messenger = Arc::new(WhatsAppClient::new(&config.whatsapp)?);
    let adapters = Adapters {
        cache: backend.adapter(),
        catalog: Arc::new(SqliteCatalog::new(db.clone())),
        messenger: messenger.clone(),
        inference: Arc::new(OpenAiProvider::new(&config.inference)?),
        enricher: Arc::new(OpenAiEnricher::new(
            vitrina_openai::build_client(&config.inference)?,
            &config.inference,
        )),
    };

    let store = Arc::new(SessionStore::new(
        adapters.cache.clone(),
        Duration::from_secs(config.session.ttl_secs),
        config.agent.default_admin_id.clone(),
    ));
    let pipeline = Arc::new(ConversationPipeline::new(&config, &adapters, store.clone()));
    let guard = IdempotencyGuard::new(
        adapters.cache.clone(),
        Duration::from_secs(config.session.processed_ttl_secs),
    );

    // Flushed albums re-enter through the same queue as webhook deliveries.
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
    let albums = AlbumAggregator::new(
        adapters.cache.clone(),
        adapters.messenger.clone(),
        inbound_tx.clone(),
        AlbumSettings::from_config(
            &config.album,
            Duration::from_secs(config.whatsapp.media_timeout_secs),
        ),
    );
    let agent_loop = AgentLoop::new(inbound_rx, guard, albums, pipeline);

    let cancel = shutdown::install_signal_handler();

    let timeout_handle = if config.timeout.enabled {
        let worker = TimeoutWorker::new(store, messenger, &config.timeout);
        let worker_cancel = cancel.clone();
        Some(tokio::spawn(async move { worker.run(worker_cancel).await }))
    } else {
        info!("inactivity timeout disabled");
        None
    };

    let purge_handle = tokio::spawn(purge_loop(backend, cancel.clone()));

    let gateway_config = config.gateway.clone();
    let gateway_cancel = cancel.clone();
    let gateway_handle = tokio::spawn(async move {
        let state = GatewayState::new(inbound_tx);
        if let Err(e) = vitrina_gateway::start_server(&gateway_config, state, gateway_cancel.clone()).await {
            error!(error = %e, "gateway stopped");
            // Without the webhook nothing reaches the agent.
            gateway_cancel.cancel();
        }
    });

    agent_loop.run(cancel.clone()).await;
    cancel.cancel();

    if let Err(e) = gateway_handle.await {
        warn!(error = %e, "gateway task panicked");
    }
    if let Some(handle) = timeout_handle
        && let Err(e) = handle.await
    {
        warn!(error = %e, "timeout worker panicked");
    }
    if let Err(e) = purge_handle.await {
        warn!(error = %e, "cache purge task panicked");
    }

    if config.storage.wal_mode
        && let Err(e) = db.checkpoint().await
    {
        warn!(error = %e, "final WAL checkpoint failed");
    }
    info!("vitrina stopped");
    Ok(())
}

async fn purge_loop(backend: CacheBackend, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(PURGE_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => match backend.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "expired cache entries purged"),
                Err(e) => warn!(error = %e, "cache purge failed"),
            },
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vitrina={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
