//! In-memory route store with optional JSON persistence.
//!
//! With a data file configured, every accepted write is saved before it is
//! acknowledged or published. Saves go to a sibling temp file that is then
//! renamed over the data file, so a crash mid-save leaves the old file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

use crate::observability::metrics;
use crate::route::RouteRecord;
use crate::store::events::{RouteEvent, RouteWatch, WatchSource};
use crate::store::{RouteStore, StoreError};

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<String, Arc<RouteRecord>>,
    /// Last revision handed out; store-wide, so it also orders events.
    revision: u64,
}

/// Data file layout. The counter is kept even when the route holding the
/// highest revision has been deleted.
#[derive(Debug, Default, Deserialize)]
struct StoreFile {
    revision: u64,
    #[serde(default)]
    routes: BTreeMap<String, RouteRecord>,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    revision: u64,
    routes: BTreeMap<&'a str, &'a RouteRecord>,
}

#[derive(Debug)]
struct StoreInner {
    state: RwLock<StoreState>,
    events: broadcast::Sender<RouteEvent>,
    persistence_path: Option<PathBuf>,
}

impl StoreInner {
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(state: &StoreState) -> RouteEvent {
        RouteEvent::Snapshot {
            revision: state.revision,
            records: state.records.values().cloned().collect(),
        }
    }

    /// Assign the next revision, store, persist and publish. Runs under the
    /// write lock so revisions are unique and events leave in revision order.
    /// A failed save leaves the state as it was.
    fn commit(&self, state: &mut StoreState, mut record: RouteRecord) -> Result<RouteRecord, StoreError> {
        let revision = state.revision + 1;
        record.revision = revision;

        let record = Arc::new(record);
        let previous = state.records.insert(record.id.clone(), record.clone());
        state.revision = revision;

        if let Err(e) = self.persist(state) {
            match previous {
                Some(previous) => state.records.insert(record.id.clone(), previous),
                None => state.records.remove(&record.id),
            };
            state.revision = revision - 1;
            return Err(e);
        }

        // No receivers is fine: workers may not be running yet.
        let _ = self.events.send(RouteEvent::Put(record.clone()));
        metrics::record_store_revision(revision);
        Ok((*record).clone())
    }

    fn remove(&self, state: &mut StoreState, id: &str) -> Result<u64, StoreError> {
        let Some(previous) = state.records.remove(id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        let revision = state.revision + 1;
        state.revision = revision;

        if let Err(e) = self.persist(state) {
            state.records.insert(id.to_string(), previous);
            state.revision = revision - 1;
            return Err(e);
        }

        let _ = self.events.send(RouteEvent::Delete {
            id: id.to_string(),
            revision,
        });
        metrics::record_store_revision(revision);
        Ok(revision)
    }

    /// Write `state` to the data file, if one is configured.
    fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let file = StoreFileRef {
            revision: state.revision,
            routes: state
                .records
                .iter()
                .map(|(id, record)| (id.as_str(), record.as_ref()))
                .collect(),
        };

        let tmp = temp_path(path);
        let written = write_file(&tmp, &file).and_then(|()| fs::rename(&tmp, path).map_err(StoreError::from));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            tracing::error!(path = ?path, error = %e, "Failed to save store file");
            return Err(e);
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "routes.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_file(path: &Path, file: &StoreFileRef<'_>) -> Result<(), StoreError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, file)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

impl WatchSource for StoreInner {
    fn subscribe(&self) -> (broadcast::Receiver<RouteEvent>, RouteEvent) {
        // Holding the read lock blocks commits, so no event can slip between
        // the snapshot and the subscription.
        let state = self.read();
        let rx = self.events.subscribe();
        (rx, Self::snapshot(&state))
    }
}

/// A thread-safe, totally ordered route store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    /// Create an empty store whose watchers buffer up to `channel_capacity` events.
    pub fn new(channel_capacity: usize, persistence_path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState::default()),
                events,
                persistence_path,
            }),
        }
    }

    /// Load from file if it exists; later saves go to the same file.
    pub fn load_from_file(path: &Path, channel_capacity: usize) -> Result<Self, StoreError> {
        let store = Self::new(channel_capacity, Some(path.to_path_buf()));
        if path.exists() {
            let file = File::open(path)?;
            let reader = BufReader::new(file);
            let file: StoreFile = serde_json::from_reader(reader)?;

            let mut state = store.inner.write();
            state.revision = file.revision;
            for (id, record) in file.routes {
                if id != record.id {
                    return Err(StoreError::Corrupt(format!(
                        "key `{}` holds route `{}`",
                        id, record.id
                    )));
                }
                state.revision = state.revision.max(record.revision);
                state.records.insert(id, Arc::new(record));
            }
            tracing::info!(
                routes = state.records.len(),
                revision = state.revision,
                "Loaded routes from store file"
            );
        }
        Ok(store)
    }

    /// Save to file, if a persistence path is configured. Writes already
    /// save themselves; this flushes a store that has seen none.
    pub fn save_to_file(&self) -> Result<(), StoreError> {
        let state = self.inner.read();
        self.inner.persist(&state)?;
        if let Some(path) = &self.inner.persistence_path {
            tracing::info!(routes = state.records.len(), path = ?path, "Saved routes to store file");
        }
        Ok(())
    }
}

impl RouteStore for MemoryStore {
    fn create(&self, record: RouteRecord) -> Result<RouteRecord, StoreError> {
        let mut state = self.inner.write();
        if state.records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        self.inner.commit(&mut state, record)
    }

    fn put(&self, record: RouteRecord) -> Result<RouteRecord, StoreError> {
        let mut state = self.inner.write();
        self.inner.commit(&mut state, record)
    }

    fn get(&self, id: &str) -> Result<Option<RouteRecord>, StoreError> {
        Ok(self.inner.read().records.get(id).map(|r| (**r).clone()))
    }

    fn list(&self) -> Result<Vec<RouteRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .records
            .values()
            .map(|r| (**r).clone())
            .collect())
    }

    fn delete(&self, id: &str) -> Result<u64, StoreError> {
        let mut state = self.inner.write();
        self.inner.remove(&mut state, id)
    }

    fn watch(&self) -> Result<RouteWatch, StoreError> {
        Ok(RouteWatch::new(self.inner.clone()))
    }

    fn revision(&self) -> u64 {
        self.inner.read().revision
    }
}
