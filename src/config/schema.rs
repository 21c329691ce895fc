//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the route gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Data-plane listener (where routed traffic arrives).
    pub listener: ListenerConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Route store settings.
    pub store: StoreConfig,

    /// Config propagation from the store to gateway workers.
    pub propagation: PropagationConfig,

    /// Script engine limits.
    pub script: ScriptConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Optional TOML file of declared routes, watched for changes.
    pub routes_file: Option<String>,
}

/// Data-plane listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Number of independent gateway workers, each with its own script cache.
    pub workers: usize,

    /// Maximum request body forwarded upstream, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9080".to_string(),
            request_timeout_secs: 30,
            workers: 2,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API.
    pub enabled: bool,

    /// Admin API bind address.
    pub bind_address: String,

    /// Bearer token required on admin requests. Empty disables auth.
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:9180".to_string(),
            api_key: String::new(),
        }
    }
}

/// Route store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file the store is loaded from at startup and saved to on shutdown.
    pub data_path: Option<String>,
}

/// Propagation of store changes to gateway workers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Artificial delivery latency per event, in milliseconds.
    pub delivery_delay_ms: u64,

    /// Upper bound for a write to become visible on every worker, in milliseconds.
    pub settle_timeout_ms: u64,

    /// Watch channel capacity before a slow worker is resynced from a snapshot.
    pub channel_capacity: usize,
}

impl PropagationConfig {
    pub fn delivery_delay(&self) -> Duration {
        Duration::from_millis(self.delivery_delay_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            delivery_delay_ms: 0,
            settle_timeout_ms: 2_000,
            channel_capacity: 1024,
        }
    }
}

/// Script engine limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Wall-clock budget for a single phase hook, in milliseconds.
    pub exec_timeout_ms: u64,

    /// Maximum engine operations per hook (0 = unlimited).
    pub max_operations: u64,

    /// Maximum function call depth.
    pub max_call_depth: usize,

    /// Maximum length of strings built by a script.
    pub max_string_bytes: usize,

    /// Maximum accepted script source size.
    pub max_source_bytes: usize,
}

impl ScriptConfig {
    pub fn exec_timeout(&self) -> Duration {
        Duration::from_millis(self.exec_timeout_ms)
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            exec_timeout_ms: 100,
            max_operations: 1_000_000,
            max_call_depth: 32,
            max_string_bytes: 1024 * 1024,
            max_source_bytes: 256 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Number of script log lines kept for the admin log reader.
    pub script_log_capacity: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9091".to_string(),
            script_log_capacity: 4096,
        }
    }
}
