//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Every
//! field has a default so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Inbound trigger listener.
    pub gateway: GatewayListenerConfig,

    /// Listener workers connect to.
    pub workers: WorkerListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Inbound trigger listener.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GatewayListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9001").
    pub bind_address: String,

    /// Maximum buffered request body in bytes.
    pub max_body_bytes: usize,

    /// Deadline for a worker to answer, in seconds. 0 disables it and
    /// callers wait for as long as the worker stays connected.
    pub request_timeout_secs: u64,
}

impl GatewayListenerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

impl Default for GatewayListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9001".to_string(),
            max_body_bytes: 4 * 1024 * 1024, // 4MB
            request_timeout_secs: 0,
        }
    }
}

/// Listener for worker streams.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WorkerListenerConfig {
    /// Bind address (e.g., "127.0.0.1:50051").
    pub bind_address: String,
}

impl Default for WorkerListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:50051".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
