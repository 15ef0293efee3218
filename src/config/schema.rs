//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the plugin host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PluginConfig {
    /// Unix socket listener settings.
    pub listener: ListenerConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Filesystem path of the Unix domain socket.
    pub socket_path: PathBuf,

    /// Remove a leftover socket file at `socket_path` before binding.
    ///
    /// Only socket files are removed; any other file type makes binding fail.
    pub remove_stale_socket: bool,

    /// Permission bits applied to the socket file after binding.
    pub socket_mode: Option<u32>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/run/plugin-host/group.sock"),
            remove_stale_socket: false,
            socket_mode: Some(0o700),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long the listener close task waits for in-flight connections.
    ///
    /// `None` keeps shutdown drain-less: connections are neither awaited nor interrupted.
    pub drain_timeout_ms: Option<u64>,
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_ms.map(Duration::from_millis)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is not set.
    pub log_filter: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "plugin_host=info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: PluginConfig = toml::from_str(
            r#"
            [listener]
            socket_path = "/tmp/group.sock"

            [shutdown]
            drain_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.socket_path, PathBuf::from("/tmp/group.sock"));
        assert_eq!(config.listener.socket_mode, Some(0o700));
        assert!(!config.listener.remove_stale_socket);
        assert_eq!(config.shutdown.drain_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.observability.log_filter, "plugin_host=info");
    }

    #[test]
    fn shutdown_is_drainless_by_default() {
        assert_eq!(PluginConfig::default().shutdown.drain_timeout(), None);
    }
}
