//! Rhai-backed script engine.
//!
//! A route script is a Rhai module whose functions are named after the
//! phases they hook:
//!
//! ```text
//! fn access(ctx) {
//!     ctx.log_warn("hit access phase");
//! }
//! ```
//!
//! Top-level statements are parsed but never run; only phase hooks execute.

use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, Scope, AST};
use std::cell::Cell;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ScriptConfig;
use crate::script::context::ScriptContext;
use crate::script::engine::{Program, ScriptEngine};
use crate::script::types::{Phase, PhaseSet, ScriptError};

thread_local! {
    // Deadline of the hook currently running on this thread.
    static DEADLINE: Cell<Option<Instant>> = const { Cell::new(None) };
}

/// Operations between two deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 128;

/// Script engine backed by a shared Rhai `Engine`.
#[derive(Debug, Clone)]
pub struct RhaiEngine {
    engine: Arc<Engine>,
    max_source_bytes: usize,
}

impl RhaiEngine {
    pub fn new(config: &ScriptConfig) -> Self {
        let mut engine = Engine::new();

        engine.set_max_operations(config.max_operations);
        engine.set_max_call_levels(config.max_call_depth);
        engine.set_max_string_size(config.max_string_bytes);
        engine.disable_symbol("eval");

        engine.on_progress(|ops| {
            if ops % DEADLINE_CHECK_INTERVAL != 0 {
                return None;
            }
            let expired = DEADLINE.with(|d| d.get().is_some_and(|at| Instant::now() >= at));
            expired.then(|| Dynamic::from("deadline exceeded"))
        });

        register_context_api(&mut engine);

        Self {
            engine: Arc::new(engine),
            max_source_bytes: config.max_source_bytes,
        }
    }

    fn parse(&self, source: &str) -> Result<(AST, PhaseSet), ScriptError> {
        if source.trim().is_empty() {
            return Err(ScriptError::Empty);
        }
        if source.len() > self.max_source_bytes {
            return Err(ScriptError::TooLarge {
                size: source.len(),
                max: self.max_source_bytes,
            });
        }

        let ast = self.engine.compile(source).map_err(|e| ScriptError::Syntax {
            detail: e.to_string(),
        })?;

        let mut phases = PhaseSet::new();
        for meta in ast.iter_functions() {
            let Some(phase) = Phase::from_fn_name(meta.name) else {
                continue;
            };
            if meta.params.len() != 1 {
                return Err(ScriptError::PhaseSignature {
                    phase,
                    found: meta.params.len(),
                });
            }
            phases.insert(phase);
        }

        Ok((ast, phases))
    }
}

impl Default for RhaiEngine {
    fn default() -> Self {
        Self::new(&ScriptConfig::default())
    }
}

impl ScriptEngine for RhaiEngine {
    fn validate(&self, source: &str) -> Result<(), ScriptError> {
        self.parse(source).map(|_| ())
    }

    fn compile(&self, source: &str) -> Result<Arc<dyn Program>, ScriptError> {
        let (ast, phases) = self.parse(source)?;
        Ok(Arc::new(RhaiProgram {
            engine: self.engine.clone(),
            ast,
            phases,
        }))
    }
}

/// A parsed Rhai module plus its declared phases.
#[derive(Debug)]
pub struct RhaiProgram {
    engine: Arc<Engine>,
    ast: AST,
    phases: PhaseSet,
}

impl Program for RhaiProgram {
    fn phases(&self) -> &PhaseSet {
        &self.phases
    }

    fn execute(&self, phase: Phase, ctx: ScriptContext, deadline: Instant) -> Result<(), ScriptError> {
        if !self.phases.contains(&phase) {
            return Ok(());
        }

        ctx.enter_phase(phase);
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let mut scope = Scope::new();

        let started = Instant::now();
        DEADLINE.with(|d| d.set(Some(deadline)));
        let result = self
            .engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, phase.as_str(), (ctx,));
        DEADLINE.with(|d| d.set(None));

        result.map(|_| ()).map_err(|err| match *err {
            EvalAltResult::ErrorTerminated(..) => ScriptError::Timeout {
                phase,
                budget: deadline.saturating_duration_since(started),
            },
            other => ScriptError::Runtime {
                phase,
                detail: other.to_string(),
            },
        })
    }
}

fn register_context_api(engine: &mut Engine) {
    engine.register_type_with_name::<ScriptContext>("Context");

    engine.register_fn("route_id", ScriptContext::route_id);
    engine.register_fn("method", ScriptContext::method);
    engine.register_fn("path", ScriptContext::path);
    engine.register_fn("header", |ctx: &mut ScriptContext, name: &str| -> Dynamic {
        ctx.header(name).map(Dynamic::from).unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("status", |ctx: &mut ScriptContext| -> Dynamic {
        ctx.upstream_status()
            .map(|s| Dynamic::from(s as rhai::INT))
            .unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("set_header", ScriptContext::set_header);
    engine.register_fn(
        "exit",
        |ctx: &mut ScriptContext, status: rhai::INT, body: &str| -> Result<(), Box<EvalAltResult>> {
            let status = u16::try_from(status)
                .ok()
                .filter(|s| (100..=599).contains(s))
                .ok_or_else(|| format!("invalid exit status {}", status))?;
            ctx.exit(status, body);
            Ok(())
        },
    );
    engine.register_fn("log_info", ScriptContext::log_info);
    engine.register_fn("log_warn", ScriptContext::log_warn);
    engine.register_fn("log_error", ScriptContext::log_error);
}
