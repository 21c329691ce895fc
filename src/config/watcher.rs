//! Declared routes file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_routes_file;
use crate::route::RouteWrite;

/// A watcher that monitors the declared routes file for changes.
pub struct RoutesFileWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<Vec<RouteWrite>>,
}

impl RoutesFileWatcher {
    /// Create a new RoutesFileWatcher.
    ///
    /// Returns the watcher and a receiver for parsed route sets.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Vec<RouteWrite>>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            update_tx,
        }, update_rx)
    }

    /// Send the current file contents once, then start watching in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        reload(&self.path, &self.update_tx);

        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "Routes file change detected, reloading");
                        reload(&path, &tx);
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Routes file watch error"),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Routes file watcher started");
        Ok(watcher)
    }
}

fn reload(path: &Path, tx: &mpsc::UnboundedSender<Vec<RouteWrite>>) {
    match load_routes_file(path) {
        Ok(routes) => {
            tracing::debug!(count = routes.len(), "Routes file parsed");
            let _ = tx.send(routes);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load routes file, keeping current routes");
        }
    }
}
