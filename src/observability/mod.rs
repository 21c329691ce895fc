//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Route scripts produce:
//!     → tracing events on target `route_gateway::script`
//!     → script_log.rs (bounded buffer read and cleared via the admin API)
//! ```
//!
//! # Design Decisions
//! - Route id and revision are attached as fields on every lifecycle event
//! - Metrics are cheap (no-op until a recorder is installed)

pub mod logging;
pub mod metrics;
pub mod script_log;

pub use script_log::{ScriptLog, ScriptLogEntry, ScriptLogLevel};
