//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Init logging/metrics → Open store
//!     → Start workers → Bind admin + gateway listeners → Ready
//!
//! Shutdown:
//!     signals.rs (SIGTERM / Ctrl+C)
//!     → shutdown.rs trigger
//!     → listeners drain, propagators stop
//!     → store flushed to disk → Exit
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::shutdown_on_signal;
pub use startup::{start, RunningGateway, StartupError};
