//! The set of gateway workers behind the data-plane listener.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::{PropagationConfig, ScriptConfig};
use crate::lifecycle::Shutdown;
use crate::observability::ScriptLog;
use crate::runtime::propagator::Propagator;
use crate::runtime::worker::GatewayWorker;
use crate::script::ScriptEngine;
use crate::store::{RouteStore, StoreError};

/// Point-in-time view of one worker, for the status endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkerStatus {
    pub index: usize,
    pub applied_revision: u64,
    pub routes: usize,
}

/// Independent workers, each converging on the store through its own watch.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Arc<GatewayWorker>>,
    next: AtomicUsize,
    delivery_delay: Duration,
}

impl WorkerPool {
    pub fn new(
        count: usize,
        engine: Arc<dyn ScriptEngine>,
        script: &ScriptConfig,
        propagation: &PropagationConfig,
        log: ScriptLog,
    ) -> Self {
        let workers = (0..count.max(1))
            .map(|index| {
                Arc::new(GatewayWorker::new(
                    index,
                    engine.clone(),
                    script.exec_timeout(),
                    log.clone(),
                ))
            })
            .collect();

        Self {
            workers,
            next: AtomicUsize::new(0),
            delivery_delay: propagation.delivery_delay(),
        }
    }

    /// Subscribe every worker to `store` and spawn its propagator.
    pub fn start(&self, store: &dyn RouteStore, shutdown: &Shutdown) -> Result<Vec<JoinHandle<()>>, StoreError> {
        let mut handles = Vec::with_capacity(self.workers.len());
        for worker in &self.workers {
            let propagator = Propagator::new(worker.clone(), store.watch()?, self.delivery_delay);
            handles.push(tokio::spawn(propagator.run(shutdown.subscribe())));
        }
        tracing::info!(workers = self.workers.len(), "Gateway workers started");
        Ok(handles)
    }

    /// Next worker in rotation; requests spread across all workers.
    pub fn pick(&self) -> &Arc<GatewayWorker> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        &self.workers[index]
    }

    pub fn workers(&self) -> &[Arc<GatewayWorker>] {
        &self.workers
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// True once every worker has applied `revision` within `bound`.
    pub async fn wait_for_revision(&self, revision: u64, bound: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + bound;
        for worker in &self.workers {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if !worker.wait_for_revision(revision, remaining).await {
                return false;
            }
        }
        true
    }

    pub fn status(&self) -> Vec<WorkerStatus> {
        self.workers
            .iter()
            .map(|w| WorkerStatus {
                index: w.index(),
                applied_revision: w.applied_revision(),
                routes: w.table().len(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{RouteRecord, RouteWrite};
    use crate::script::RhaiEngine;
    use crate::store::MemoryStore;

    fn pool(count: usize) -> WorkerPool {
        let script = ScriptConfig::default();
        WorkerPool::new(
            count,
            Arc::new(RhaiEngine::new(&script)),
            &script,
            &PropagationConfig::default(),
            ScriptLog::new(16),
        )
    }

    #[test]
    fn test_pick_rotates() {
        let pool = pool(3);
        let picked: Vec<usize> = (0..6).map(|_| pool.pick().index()).collect();
        assert_eq!(picked, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_at_least_one_worker() {
        assert_eq!(pool(0).len(), 1);
    }

    #[tokio::test]
    async fn test_all_workers_converge() {
        let store = MemoryStore::new(16, None);
        let pool = pool(4);
        let shutdown = Shutdown::new();
        pool.start(&store, &shutdown).unwrap();

        let record = RouteRecord::from_write(
            "r1".into(),
            RouteWrite {
                uri: "/r1".into(),
                ..Default::default()
            },
        );
        let rev = store.put(record).unwrap().revision;

        assert!(pool.wait_for_revision(rev, Duration::from_secs(2)).await);
        for status in pool.status() {
            assert_eq!(status.applied_revision, rev);
            assert_eq!(status.routes, 1);
        }
        shutdown.trigger();
    }
}
