//! Request context handed to script phase hooks.
//!
//! The context is a cheap handle over shared state: the engine passes scripts
//! a clone, and whatever the script changes is visible to the gateway once the
//! phase returns.

use axum::http::{HeaderMap, Method};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::observability::script_log::{ScriptLog, ScriptLogLevel};
use crate::script::types::Phase;

/// Response a script asked the gateway to send instead of proxying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptExit {
    pub status: u16,
    pub body: String,
}

#[derive(Debug)]
struct ContextState {
    route_id: String,
    method: Method,
    path: String,
    headers: HeaderMap,
    phase: Phase,
    upstream_status: Option<u16>,
    pending_headers: Vec<(String, String)>,
    exit: Option<ScriptExit>,
}

/// Per-request state shared between the gateway and a route script.
#[derive(Debug, Clone)]
pub struct ScriptContext {
    state: Arc<Mutex<ContextState>>,
    log: ScriptLog,
}

impl ScriptContext {
    pub fn new(
        route_id: impl Into<String>,
        method: Method,
        path: impl Into<String>,
        headers: HeaderMap,
        log: ScriptLog,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ContextState {
                route_id: route_id.into(),
                method,
                path: path.into(),
                headers,
                phase: Phase::Rewrite,
                upstream_status: None,
                pending_headers: Vec::new(),
                exit: None,
            })),
            log,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        // A panicking script call must not poison the request for later phases.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // --- Gateway side ---

    /// Mark the phase about to run.
    pub fn enter_phase(&self, phase: Phase) {
        self.lock().phase = phase;
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Record the upstream status for `header_filter` and `log`.
    pub fn set_upstream_status(&self, status: u16) {
        self.lock().upstream_status = Some(status);
    }

    /// Headers the script set since the last call.
    pub fn take_pending_headers(&self) -> Vec<(String, String)> {
        std::mem::take(&mut self.lock().pending_headers)
    }

    /// The short-circuit response, if the script requested one.
    pub fn exit_response(&self) -> Option<ScriptExit> {
        self.lock().exit.clone()
    }

    // --- Script side ---

    pub fn route_id(&mut self) -> String {
        self.lock().route_id.clone()
    }

    pub fn method(&mut self) -> String {
        self.lock().method.to_string()
    }

    pub fn path(&mut self) -> String {
        self.lock().path.clone()
    }

    /// Request header value, or `None` when absent or not valid UTF-8.
    pub fn header(&mut self, name: &str) -> Option<String> {
        self.lock()
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn upstream_status(&mut self) -> Option<u16> {
        self.lock().upstream_status
    }

    /// Queue a header: forwarded upstream before the response, added to the
    /// client response in `header_filter`.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.lock()
            .pending_headers
            .push((name.to_string(), value.to_string()));
    }

    /// Stop processing and answer with `status` and `body`.
    pub fn exit(&mut self, status: u16, body: &str) {
        self.lock().exit = Some(ScriptExit {
            status,
            body: body.to_string(),
        });
    }

    pub fn log_info(&mut self, message: &str) {
        self.emit(ScriptLogLevel::Info, message);
    }

    pub fn log_warn(&mut self, message: &str) {
        self.emit(ScriptLogLevel::Warn, message);
    }

    pub fn log_error(&mut self, message: &str) {
        self.emit(ScriptLogLevel::Error, message);
    }

    fn emit(&self, level: ScriptLogLevel, message: &str) {
        let (route_id, phase) = {
            let state = self.lock();
            (state.route_id.clone(), state.phase)
        };

        match level {
            ScriptLogLevel::Info => {
                tracing::info!(target: "route_gateway::script", route_id = %route_id, phase = %phase, "{:?}", message)
            }
            ScriptLogLevel::Warn => {
                tracing::warn!(target: "route_gateway::script", route_id = %route_id, phase = %phase, "{:?}", message)
            }
            ScriptLogLevel::Error => {
                tracing::error!(target: "route_gateway::script", route_id = %route_id, phase = %phase, "{:?}", message)
            }
        }
        self.log.push(level, &route_id, phase.as_str(), message);
    }
}
