//! Route scripting subsystem.
//!
//! # Data Flow
//! ```text
//! Control plane (route write):
//!     script source
//!     → engine.rs (ScriptEngine::validate, parse only)
//!     → accepted or ScriptError::Syntax
//!
//! Data plane (gateway worker):
//!     propagated script source
//!     → engine.rs (ScriptEngine::compile → Program)
//!     → CompiledScript keyed by (route id, revision)
//!     → Program::execute(phase, context.rs) per request
//! ```
//!
//! # Design Decisions
//! - Scripts are opaque text outside this module
//! - Rhai is the only engine; callers depend on the traits in engine.rs
//! - Only phase hooks run, never top-level statements
//! - Every execution has a deadline enforced inside the engine

pub mod context;
pub mod engine;
pub mod rhai_engine;
pub mod types;

pub use context::{ScriptContext, ScriptExit};
pub use engine::{CompiledScript, Program, ScriptEngine};
pub use rhai_engine::RhaiEngine;
pub use types::{Phase, PhaseSet, ScriptError};
