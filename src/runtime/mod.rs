//! Gateway script runtime.
//!
//! # Data Flow
//! ```text
//! Store watch (one per worker)
//!     → propagator.rs (optional delivery delay)
//!     → worker.rs apply (ignore stale, compile, swap)
//!     → table.rs RouteEntry { state.rs tag, ArcSwap artifact }
//!
//! Gateway request
//!     → pool.rs pick worker
//!     → table.rs match path
//!     → worker.rs run_phase per phase (blocking thread, deadline)
//! ```
//!
//! # Design Decisions
//! - No global state: every worker owns its table and compiled scripts
//! - Workers converge independently; the store revision is the only clock
//! - Readers never lock against compilation

pub mod pool;
pub mod propagator;
pub mod state;
pub mod table;
pub mod worker;

pub use pool::{WorkerPool, WorkerStatus};
pub use propagator::Propagator;
pub use state::ScriptState;
pub use table::{RouteEntry, RouteTable};
pub use worker::GatewayWorker;
