//! Route change events and the restartable watch stream.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::route::RouteRecord;

/// A change published by the store.
#[derive(Debug, Clone)]
pub enum RouteEvent {
    /// Full state at `revision`. Always the first event of a watch, and
    /// re-sent whenever a watcher falls behind.
    Snapshot {
        revision: u64,
        records: Vec<Arc<RouteRecord>>,
    },
    /// A route was created or replaced.
    Put(Arc<RouteRecord>),
    /// A route was removed at `revision`.
    Delete { id: String, revision: u64 },
}

impl RouteEvent {
    pub fn revision(&self) -> u64 {
        match self {
            RouteEvent::Snapshot { revision, .. } => *revision,
            RouteEvent::Put(record) => record.revision,
            RouteEvent::Delete { revision, .. } => *revision,
        }
    }
}

/// Something a `RouteWatch` can (re)subscribe to.
pub trait WatchSource: Send + Sync {
    /// Subscribe and snapshot atomically: every change after the snapshot is
    /// delivered on the returned receiver, nothing before it is.
    fn subscribe(&self) -> (broadcast::Receiver<RouteEvent>, RouteEvent);
}

/// Push-based stream of route changes.
pub struct RouteWatch {
    source: Arc<dyn WatchSource>,
    rx: broadcast::Receiver<RouteEvent>,
    pending: Option<RouteEvent>,
}

impl RouteWatch {
    pub fn new(source: Arc<dyn WatchSource>) -> Self {
        let (rx, snapshot) = source.subscribe();
        Self {
            source,
            rx,
            pending: Some(snapshot),
        }
    }

    /// Next event, or `None` once the store is gone.
    ///
    /// A watcher that lagged behind the channel gets a fresh snapshot instead
    /// of a gap.
    pub async fn recv(&mut self) -> Option<RouteEvent> {
        if let Some(event) = self.pending.take() {
            return Some(event);
        }

        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Route watch lagged, resyncing from snapshot");
                let (rx, snapshot) = self.source.subscribe();
                self.rx = rx;
                Some(snapshot)
            }
            Err(RecvError::Closed) => None,
        }
    }

    /// Start over from a fresh snapshot.
    pub fn restart(&mut self) {
        let (rx, snapshot) = self.source.subscribe();
        self.rx = rx;
        self.pending = Some(snapshot);
    }
}

impl std::fmt::Debug for RouteWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteWatch")
            .field("pending", &self.pending.as_ref().map(RouteEvent::revision))
            .finish()
    }
}
