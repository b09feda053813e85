//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the host.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the function host.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Logical name of the hosted function, used for logging.
    pub name: String,

    /// Shared outbound HTTP client settings.
    pub client: ClientConfig,

    /// Runtime API (event source) settings.
    pub runtime: RuntimeConfig,

    /// Local invoke server settings.
    pub local: LocalServerConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: "function-host".to_string(),
            client: ClientConfig::default(),
            runtime: RuntimeConfig::default(),
            local: LocalServerConfig::default(),
            shutdown: ShutdownConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Timeouts for the shared outbound HTTP client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Read timeout in seconds.
    pub read_timeout_secs: u64,

    /// How long a graceful release waits for borrowed client handles, in milliseconds.
    pub drain_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            drain_timeout_ms: 5_000,
        }
    }
}

/// Runtime API configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Host and port of the Runtime API (e.g., "127.0.0.1:9001").
    pub api_endpoint: Option<String>,

    /// Logical handler name exposed to handlers through their context.
    pub handler: Option<String>,
}

/// Local invoke server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalServerConfig {
    /// Serve invocations from a local HTTP endpoint instead of the Runtime API.
    pub enabled: bool,

    /// Bind address (e.g., "127.0.0.1:7000").
    pub bind_address: String,

    /// Maximum number of queued invocations (backpressure).
    pub queue_capacity: usize,

    /// Deadline given to each local invocation, in seconds.
    pub invocation_timeout_secs: u64,
}

impl Default for LocalServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:7000".to_string(),
            queue_capacity: 16,
            invocation_timeout_secs: 30,
        }
    }
}

/// Termination signals that trigger a graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SignalKind {
    /// SIGINT (operator interrupt).
    #[serde(rename = "sigint")]
    Interrupt,
    /// SIGTERM (operator terminate).
    #[serde(rename = "sigterm")]
    Terminate,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Signals that start the graceful shutdown sequence.
    pub signals: Vec<SignalKind>,

    /// Upper bound on waiting for the event loop to stop, in seconds.
    /// Zero waits for in-flight invocations indefinitely.
    pub drain_timeout_secs: u64,
}

impl ShutdownConfig {
    /// The loop drain bound, if any.
    pub fn drain_timeout(&self) -> Option<Duration> {
        (self.drain_timeout_secs > 0).then(|| Duration::from_secs(self.drain_timeout_secs))
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            signals: vec![SignalKind::Terminate, SignalKind::Interrupt],
            drain_timeout_secs: 0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default tracing filter directive, overridden by `RUST_LOG`.
    pub log_filter: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "function_host=info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.client.connect_timeout_secs, 30);
        assert_eq!(config.client.read_timeout_secs, 30);
        assert!(!config.local.enabled);
        assert_eq!(
            config.shutdown.signals,
            vec![SignalKind::Terminate, SignalKind::Interrupt]
        );
        assert_eq!(config.shutdown.drain_timeout(), None);
    }

    #[test]
    fn test_partial_toml() {
        let config: HostConfig = toml::from_str(
            r#"
            name = "webhook"

            [client]
            connect_timeout_secs = 5

            [shutdown]
            signals = ["sigint"]
            drain_timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "webhook");
        assert_eq!(config.client.connect_timeout_secs, 5);
        assert_eq!(config.client.read_timeout_secs, 30);
        assert_eq!(config.shutdown.signals, vec![SignalKind::Interrupt]);
        assert_eq!(config.shutdown.drain_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_unknown_signal_rejected() {
        let result: Result<HostConfig, _> = toml::from_str(
            r#"
            [shutdown]
            signals = ["sighup"]
            "#,
        );
        assert!(result.is_err());
    }
}
