//! Delivers store events to one gateway worker.

use std::sync::Arc;
use std::time::Duration;

use crate::lifecycle::ShutdownSignal;
use crate::runtime::worker::GatewayWorker;
use crate::store::RouteWatch;

/// Drives a `RouteWatch` into a worker, one event at a time and in order.
#[derive(Debug)]
pub struct Propagator {
    worker: Arc<GatewayWorker>,
    watch: RouteWatch,
    delivery_delay: Duration,
}

impl Propagator {
    pub fn new(worker: Arc<GatewayWorker>, watch: RouteWatch, delivery_delay: Duration) -> Self {
        Self {
            worker,
            watch,
            delivery_delay,
        }
    }

    /// Run until shutdown or until the store goes away.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        let index = self.worker.index();
        tracing::debug!(worker = index, "Propagator started");

        loop {
            let event = tokio::select! {
                _ = shutdown.recv() => break,
                event = self.watch.recv() => match event {
                    Some(event) => event,
                    None => {
                        tracing::warn!(worker = index, "Route store closed, propagator stopping");
                        break;
                    }
                },
            };

            if !self.delivery_delay.is_zero() {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(self.delivery_delay) => {}
                }
            }

            let revision = event.revision();
            let worker = self.worker.clone();
            // Compilation is CPU-bound; keep it off the async workers.
            if let Err(e) = tokio::task::spawn_blocking(move || worker.apply(event)).await {
                tracing::error!(worker = index, revision, error = %e, "Applying route event panicked; resyncing");
                self.watch.restart();
            }
        }

        tracing::debug!(worker = index, "Propagator stopped");
    }
}
