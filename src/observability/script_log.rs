//! In-memory capture of log lines emitted by route scripts.
//!
//! # Responsibilities
//! - Record every script log call with route, phase and level
//! - Keep a bounded window of recent lines (oldest evicted first)
//! - Serve the admin log reader and cleaner
//!
//! Script logs are also forwarded to `tracing`; this buffer exists so an
//! operator can inspect script output without access to the process logs.

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Severity of a script log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for ScriptLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptLogLevel::Info => write!(f, "info"),
            ScriptLogLevel::Warn => write!(f, "warn"),
            ScriptLogLevel::Error => write!(f, "error"),
        }
    }
}

/// One captured line.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptLogEntry {
    /// Milliseconds since the unix epoch.
    pub timestamp_ms: u64,
    pub level: ScriptLogLevel,
    pub route_id: String,
    pub phase: String,
    pub message: String,
}

impl fmt::Display for ScriptLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] route={} phase={}: {:?}",
            self.level, self.route_id, self.phase, self.message
        )
    }
}

/// Bounded, shareable buffer of script log lines.
#[derive(Debug, Clone)]
pub struct ScriptLog {
    inner: Arc<Mutex<VecDeque<ScriptLogEntry>>>,
    capacity: usize,
}

impl ScriptLog {
    /// Create a buffer holding at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity: capacity.max(1),
        }
    }

    /// Record a line, evicting the oldest one when full.
    pub fn push(&self, level: ScriptLogLevel, route_id: &str, phase: &str, message: &str) {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let entry = ScriptLogEntry {
            timestamp_ms,
            level,
            route_id: route_id.to_string(),
            phase: phase.to_string(),
            message: message.to_string(),
        };

        let mut lines = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(entry);
    }

    /// Snapshot of all buffered lines, oldest first.
    pub fn entries(&self) -> Vec<ScriptLogEntry> {
        let lines = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        lines.iter().cloned().collect()
    }

    /// Render the buffer as plain text, one line per entry.
    pub fn render(&self) -> String {
        self.entries()
            .iter()
            .map(|e| format!("{}\n", e))
            .collect()
    }

    /// Drop every buffered line, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut lines = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let removed = lines.len();
        lines.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ScriptLog {
    fn default() -> Self {
        Self::new(4096)
    }
}
