//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via clone/Arc to all subsystems
//!
//! Declared routes file (optional):
//!     watcher.rs detects change
//!     → loader.rs parses [[routes]]
//!     → admin write path (consistency + script validation)
//!     → route store → workers
//! ```
//!
//! # Design Decisions
//! - Process config is immutable once loaded; routes are the dynamic part
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::GatewayConfig;
pub use schema::ListenerConfig;
pub use schema::AdminConfig;
pub use schema::StoreConfig;
pub use schema::PropagationConfig;
pub use schema::ScriptConfig;
pub use schema::ObservabilityConfig;
