//! Engine-neutral script interface.
//!
//! Everything outside `script::rhai_engine` sees scripts only through these
//! types, so the embedded language can be replaced without touching the
//! control plane or the gateway runtime.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::script::context::ScriptContext;
use crate::script::types::{Phase, PhaseSet, ScriptError};

/// Parses and compiles script payloads.
pub trait ScriptEngine: Send + Sync + fmt::Debug {
    /// Parse-only check of `source`. Never executes, logs or stores anything.
    fn validate(&self, source: &str) -> Result<(), ScriptError>;

    /// Compile `source` into a runnable program.
    fn compile(&self, source: &str) -> Result<Arc<dyn Program>, ScriptError>;
}

/// A compiled, runnable script.
pub trait Program: Send + Sync + fmt::Debug {
    /// Phases this script declares hooks for.
    fn phases(&self) -> &PhaseSet;

    /// Run the hook for `phase`. Must give up once `deadline` passes.
    fn execute(&self, phase: Phase, ctx: ScriptContext, deadline: Instant) -> Result<(), ScriptError>;
}

/// A program bound to the route revision it was compiled from.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    pub route_id: String,
    pub revision: u64,
    pub program: Arc<dyn Program>,
}

impl CompiledScript {
    pub fn new(route_id: impl Into<String>, revision: u64, program: Arc<dyn Program>) -> Self {
        Self {
            route_id: route_id.into(),
            revision,
            program,
        }
    }

    pub fn hooks(&self, phase: Phase) -> bool {
        self.program.phases().contains(&phase)
    }
}
