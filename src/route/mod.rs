//! Route definitions and the control-plane write path.
//!
//! # Data Flow
//! ```text
//! Admin request (POST / PUT)
//!     → service.rs (resolve effective id)
//!     → consistency.rs (script_id/id/script invariants, then script validation)
//!     → store (revision assigned, event published)
//! ```
//!
//! # Design Decisions
//! - A rejected write touches nothing: checks complete before the store call
//! - PUT is a full replacement; omitting `script` detaches it
//! - Generated ids are assigned only after the checks pass

pub mod consistency;
pub mod model;
pub mod service;
pub mod types;

pub use consistency::ConsistencyEnforcer;
pub use model::{RouteRecord, RouteWrite, Upstream};
pub use service::{RouteService, SyncReport};
pub use types::RouteError;
