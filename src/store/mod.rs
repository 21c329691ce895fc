//! Route store and change propagation source.
//!
//! # Data Flow
//! ```text
//! Admin write (already checked)
//!     → RouteStore::put / create / delete
//!     → revision assigned under the store's write lock
//!     → RouteEvent published on the broadcast channel
//!     → events.rs RouteWatch (one per gateway worker)
//! ```
//!
//! # Design Decisions
//! - One store-wide revision counter: unique per write, monotonic per route
//! - Watches start from a snapshot, so a restarted worker needs no history
//! - Lagging watchers resync from a snapshot instead of seeing gaps
//! - The store never retries a failed write; the caller decides

pub mod events;
pub mod memory;

use thiserror::Error;

pub use events::{RouteEvent, RouteWatch, WatchSource};
pub use memory::MemoryStore;

use crate::route::RouteRecord;

/// Errors raised by a route store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("route not found: {0}")]
    NotFound(String),

    #[error("route already exists: {0}")]
    AlreadyExists(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store data corrupt: {0}")]
    Corrupt(String),

    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable owner of route records.
pub trait RouteStore: Send + Sync {
    /// Store a new route; fails if the id is taken.
    fn create(&self, record: RouteRecord) -> Result<RouteRecord, StoreError>;

    /// Create or replace a route. Returns the record with its new revision.
    fn put(&self, record: RouteRecord) -> Result<RouteRecord, StoreError>;

    fn get(&self, id: &str) -> Result<Option<RouteRecord>, StoreError>;

    fn list(&self) -> Result<Vec<RouteRecord>, StoreError>;

    /// Remove a route, returning the revision of the deletion.
    fn delete(&self, id: &str) -> Result<u64, StoreError>;

    /// Subscribe to changes, starting from a snapshot.
    fn watch(&self) -> Result<RouteWatch, StoreError>;

    /// Latest revision handed out.
    fn revision(&self) -> u64;
}
