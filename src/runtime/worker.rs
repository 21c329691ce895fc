//! Gateway worker: applies route events and runs script phases.
//!
//! # Responsibilities
//! - Keep the worker's route table in step with the store's event stream
//! - Compile propagated scripts and swap artifacts in atomically
//! - Run phase hooks under the execution budget
//!
//! # Design Decisions
//! - Events at or below the applied revision are ignored, so the serving
//!   revision of a route never goes backwards
//! - A failed compile leaves the previous artifact serving
//! - Script faults are isolated to the request and the route; the gateway
//!   carries on as if the phase were a no-op

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::observability::metrics;
use crate::observability::script_log::{ScriptLog, ScriptLogLevel};
use crate::route::RouteRecord;
use crate::runtime::state::ScriptState;
use crate::runtime::table::{RouteEntry, RouteTable};
use crate::script::{CompiledScript, Phase, ScriptContext, ScriptEngine, ScriptError};
use crate::store::RouteEvent;

/// Slack on top of the script budget before the gateway stops waiting for
/// the blocking task. The engine itself gives up at the budget.
const EXECUTION_GRACE: Duration = Duration::from_millis(50);

/// One independent gateway worker with its own compiled-script cache.
#[derive(Debug)]
pub struct GatewayWorker {
    index: usize,
    engine: Arc<dyn ScriptEngine>,
    table: RouteTable,
    applied: watch::Sender<u64>,
    exec_timeout: Duration,
    log: ScriptLog,
}

impl GatewayWorker {
    pub fn new(index: usize, engine: Arc<dyn ScriptEngine>, exec_timeout: Duration, log: ScriptLog) -> Self {
        let (applied, _) = watch::channel(0);
        Self {
            index,
            engine,
            table: RouteTable::new(),
            applied,
            exec_timeout,
            log,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn log(&self) -> &ScriptLog {
        &self.log
    }

    /// Highest store revision this worker has applied.
    pub fn applied_revision(&self) -> u64 {
        *self.applied.borrow()
    }

    pub fn route_state(&self, id: &str) -> Option<ScriptState> {
        self.table.get(id).map(|e| e.state())
    }

    /// Apply one store event. Compiles synchronously, so call it off the
    /// async executor. Returns false if the event was stale.
    pub fn apply(&self, event: RouteEvent) -> bool {
        let revision = event.revision();

        match event {
            // Snapshots reconcile idempotently and are always applied.
            RouteEvent::Snapshot { records, .. } => self.reconcile(records),
            _ if revision <= self.applied_revision() => {
                tracing::debug!(worker = self.index, revision, "Ignoring stale route event");
                return false;
            }
            RouteEvent::Put(record) => self.apply_put(record),
            RouteEvent::Delete { id, .. } => self.apply_delete(&id, revision),
        }

        self.applied.send_if_modified(|current| {
            if revision > *current {
                *current = revision;
                true
            } else {
                false
            }
        });
        metrics::record_worker_revision(self.index, self.applied_revision());
        true
    }

    fn apply_put(&self, record: Arc<RouteRecord>) {
        let previous = self.table.get(&record.id);
        if let Some(prev) = &previous {
            if prev.revision() >= record.revision {
                return;
            }
        }
        let carried = previous.as_ref().and_then(|p| p.script());

        let Some(source) = record.script.as_deref() else {
            tracing::info!(worker = self.index, route_id = %record.id, revision = record.revision, "Route applied without script");
            self.table.insert(Arc::new(RouteEntry::new(record, ScriptState::NoScript, None)));
            return;
        };

        // Unchanged source: rebind the serving program to the new revision.
        if let (Some(prev), Some(serving)) = (&previous, &carried) {
            if prev.state() == ScriptState::Ready && prev.record.script.as_deref() == Some(source) {
                let rebound = CompiledScript::new(record.id.clone(), record.revision, serving.program.clone());
                tracing::debug!(worker = self.index, route_id = %record.id, revision = record.revision, "Script unchanged, reusing artifact");
                self.table
                    .insert(Arc::new(RouteEntry::new(record, ScriptState::Ready, Some(Arc::new(rebound)))));
                return;
            }
        }

        let entry = Arc::new(RouteEntry::new(record.clone(), ScriptState::Compiling, carried));
        self.table.insert(entry.clone());

        match self.engine.compile(source) {
            Ok(program) => {
                entry.install(Some(Arc::new(CompiledScript::new(
                    record.id.clone(),
                    record.revision,
                    program,
                ))));
                entry.set_state(ScriptState::Ready);
                tracing::info!(worker = self.index, route_id = %record.id, revision = record.revision, "Route script compiled");
            }
            Err(e) => {
                entry.set_state(ScriptState::Failed);
                tracing::error!(
                    worker = self.index,
                    route_id = %record.id,
                    revision = record.revision,
                    error = %e,
                    "Route script failed to compile; previous artifact kept"
                );
                metrics::record_compile_failure(&record.id);
                self.log
                    .push(ScriptLogLevel::Error, &record.id, "compile", &e.to_string());
            }
        }
    }

    fn apply_delete(&self, id: &str, revision: u64) {
        if self.table.remove(id).is_some() {
            tracing::info!(worker = self.index, route_id = %id, revision, "Route removed");
        }
    }

    fn reconcile(&self, records: Vec<Arc<RouteRecord>>) {
        let removed = {
            let live: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
            self.table.retain(|id| live.contains(id))
        };
        for id in removed {
            tracing::info!(worker = self.index, route_id = %id, "Route removed on resync");
        }
        for record in records {
            self.apply_put(record);
        }
    }

    /// Resolve once `revision` is applied, or return false after `bound`.
    pub async fn wait_for_revision(&self, revision: u64, bound: Duration) -> bool {
        let mut rx = self.applied.subscribe();
        let reached = tokio::time::timeout(bound, async {
            rx.wait_for(|applied| *applied >= revision).await.is_ok()
        })
        .await;
        matches!(reached, Ok(true))
    }

    /// Run `phase` of `script` against `ctx`, bounded by the execution budget.
    ///
    /// Failures are logged, counted and copied to the script log; the caller
    /// decides whether to carry on.
    pub async fn run_phase(
        &self,
        script: &Arc<CompiledScript>,
        phase: Phase,
        ctx: &ScriptContext,
    ) -> Result<(), ScriptError> {
        if !script.hooks(phase) {
            return Ok(());
        }

        let budget = self.exec_timeout;
        let started = Instant::now();
        let deadline = started + budget;
        let program = script.program.clone();
        let task_ctx = ctx.clone();
        let task = tokio::task::spawn_blocking(move || program.execute(phase, task_ctx, deadline));

        let result = match tokio::time::timeout(budget + EXECUTION_GRACE, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ScriptError::Runtime {
                phase,
                detail: format!("script task aborted: {}", join_err),
            }),
            Err(_) => Err(ScriptError::Timeout { phase, budget }),
        };

        let outcome = match &result {
            Ok(()) => "ok",
            Err(ScriptError::Timeout { .. }) => "timeout",
            Err(_) => "fault",
        };
        metrics::record_script_execution(phase.as_str(), outcome, started.elapsed());

        if let Err(e) = &result {
            tracing::warn!(
                worker = self.index,
                route_id = %script.route_id,
                revision = script.revision,
                phase = %phase,
                error = %e,
                "Script phase failed"
            );
            self.log
                .push(ScriptLogLevel::Error, &script.route_id, phase.as_str(), &e.to_string());
        }
        result
    }
}
