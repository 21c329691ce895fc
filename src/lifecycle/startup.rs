//! Startup sequence.
//!
//! # Order
//! 1. Open the route store (loading the data file when present)
//! 2. Build the script engine and drop stored routes that fail validation
//! 3. Build the worker pool
//! 4. Start one propagator per worker
//! 5. Bind and serve the admin API and the gateway listener
//! 6. Start the declared routes file watcher
//!
//! Listeners are bound before `start` returns, so callers (and tests) can
//! use the reported addresses immediately.

use notify::RecommendedWatcher;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{self, AdminState};
use crate::config::watcher::RoutesFileWatcher;
use crate::config::GatewayConfig;
use crate::http::GatewayServer;
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};
use crate::observability::ScriptLog;
use crate::route::RouteService;
use crate::runtime::WorkerPool;
use crate::script::{RhaiEngine, ScriptEngine};
use crate::store::{MemoryStore, RouteStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("routes file watcher error: {0}")]
    Watch(#[from] notify::Error),
}

/// A started gateway: listeners bound, workers converging.
pub struct RunningGateway {
    pub gateway_addr: SocketAddr,
    pub admin_addr: Option<SocketAddr>,
    pub store: Arc<MemoryStore>,
    pub service: RouteService,
    pub pool: Arc<WorkerPool>,
    pub log: ScriptLog,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
    _routes_watcher: Option<RecommendedWatcher>,
}

impl std::fmt::Debug for RunningGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningGateway")
            .field("gateway_addr", &self.gateway_addr)
            .field("admin_addr", &self.admin_addr)
            .field("workers", &self.pool.len())
            .finish()
    }
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address).await.map_err(|source| StartupError::Bind {
        address: address.to_string(),
        source,
    })
}

fn open_store(config: &GatewayConfig) -> Result<MemoryStore, StoreError> {
    let capacity = config.propagation.channel_capacity;
    match config.store.data_path.as_deref() {
        Some(path) => MemoryStore::load_from_file(Path::new(path), capacity),
        None => Ok(MemoryStore::new(capacity, None)),
    }
}

/// Bring up every subsystem described by `config`.
pub async fn start(config: GatewayConfig) -> Result<RunningGateway, StartupError> {
    let shutdown = Shutdown::new();
    let store = Arc::new(open_store(&config)?);
    tracing::info!(revision = store.revision(), routes = store.list()?.len(), "Route store ready");

    let engine: Arc<dyn ScriptEngine> = Arc::new(RhaiEngine::new(&config.script));
    let log = ScriptLog::new(config.observability.script_log_capacity);
    let service = RouteService::new(store.clone(), engine.clone());
    let purged = service.purge_invalid()?;
    if !purged.is_empty() {
        tracing::warn!(routes = ?purged, "Removed stored routes that failed validation");
    }

    let pool = Arc::new(WorkerPool::new(
        config.listener.workers,
        engine,
        &config.script,
        &config.propagation,
        log.clone(),
    ));
    let mut tasks = pool.start(&*store, &shutdown)?;

    let admin_addr = if config.admin.enabled {
        let listener = bind(&config.admin.bind_address).await?;
        let addr = listener.local_addr().map_err(|source| StartupError::Bind {
            address: config.admin.bind_address.clone(),
            source,
        })?;
        let state = AdminState {
            service: service.clone(),
            log: log.clone(),
            pool: pool.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
            settle_timeout: config.propagation.settle_timeout(),
        };
        let signal = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, signal).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }));
        Some(addr)
    } else {
        tracing::info!("Admin API disabled");
        None
    };

    let listener = bind(&config.listener.bind_address).await?;
    let gateway_addr = listener.local_addr().map_err(|source| StartupError::Bind {
        address: config.listener.bind_address.clone(),
        source,
    })?;
    let server = GatewayServer::new(pool.clone(), &config.listener);
    let signal = shutdown.subscribe();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = server.run(listener, signal).await {
            tracing::error!(error = %e, "Gateway server failed");
        }
    }));

    let routes_watcher = match config.routes_file.as_deref() {
        Some(path) => {
            let (watcher, task) = watch_routes_file(Path::new(path), service.clone(), shutdown.subscribe())?;
            tasks.push(task);
            Some(watcher)
        }
        None => None,
    };

    Ok(RunningGateway {
        gateway_addr,
        admin_addr,
        store,
        service,
        pool,
        log,
        shutdown,
        tasks,
        _routes_watcher: routes_watcher,
    })
}

/// Apply every parsed version of the routes file through the write path.
fn watch_routes_file(
    path: &Path,
    service: RouteService,
    mut shutdown: ShutdownSignal,
) -> Result<(RecommendedWatcher, JoinHandle<()>), StartupError> {
    let (watcher, mut updates) = RoutesFileWatcher::new(path);
    let guard = watcher.run()?;

    let task = tokio::spawn(async move {
        let mut declared = HashSet::new();
        loop {
            let routes = tokio::select! {
                _ = shutdown.recv() => break,
                routes = updates.recv() => match routes {
                    Some(routes) => routes,
                    None => break,
                },
            };
            let report = service.sync_declared(routes, &mut declared);
            tracing::info!(
                applied = report.applied,
                deleted = report.deleted,
                rejected = report.rejected,
                "Declared routes synced"
            );
        }
    });

    Ok((guard, task))
}

impl RunningGateway {
    /// Handle that stops this gateway when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Resolve once every worker applied `revision`, bounded by `bound`.
    pub async fn settle(&self, revision: u64, bound: std::time::Duration) -> bool {
        self.pool.wait_for_revision(revision, bound).await
    }

    /// Wait for a shutdown trigger, then stop.
    pub async fn wait(self) -> Result<(), StoreError> {
        self.shutdown.subscribe().wait().await;
        self.stop().await
    }

    /// Stop listeners and propagators, then persist the store.
    pub async fn stop(self) -> Result<(), StoreError> {
        self.shutdown.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Task failed during shutdown");
            }
        }
        self.store.save_to_file()?;
        tracing::info!(revision = self.store.revision(), "Shutdown complete");
        Ok(())
    }
}
