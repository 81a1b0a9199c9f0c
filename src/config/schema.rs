//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// The single upstream every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Resumable upload settings.
    pub upload: UploadConfig,

    /// Per-connection timeouts.
    pub timeouts: TimeoutConfig,

    /// Read buffer pool.
    pub buffers: BufferConfig,

    /// Per-connection request queue.
    pub queue: QueueConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL requests are forwarded to; the request path is appended.
    pub base_url: String,

    /// Total attempts per request when the transport fails.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Whole-request timeout per attempt in seconds.
    pub request_timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000".to_string(),
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            request_timeout_secs: 30,
        }
    }
}

/// Resumable upload configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory holding data files and their `.state` sidecars.
    pub data_dir: PathBuf,

    /// Requests whose path contains this marker take the upload flow.
    pub route_marker: String,

    /// Client-identifier header relayed upstream with the completion notice.
    pub client_header: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            route_marker: "/file/upload".to_string(),
            client_header: "x-trassnet-client".to_string(),
        }
    }
}

/// Timeout configuration for connection handling.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Seconds without handler activity before the idle check runs.
    pub idle_secs: u64,

    /// Deadline for writing one response, in seconds.
    pub write_secs: u64,

    /// How long shutdown waits for open connections, in seconds.
    pub drain_secs: u64,
}

impl TimeoutConfig {
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_secs(self.drain_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle_secs: 15,
            write_secs: 5,
            drain_secs: 30,
        }
    }
}

/// Read buffer pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BufferConfig {
    /// Size of each connection's read buffer; also the largest accepted message.
    pub buffer_size: usize,

    /// Maximum buffers checked out at once.
    pub max_buffers: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_size: crate::buffer::pool::DEFAULT_BUFFER_SIZE,
            max_buffers: 1024,
        }
    }
}

/// Request queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Requests buffered per connection before the handler waits.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 32 }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.timeouts.idle(), Duration::from_secs(15));
        assert_eq!(config.timeouts.write(), Duration::from_secs(5));
        assert_eq!(config.buffers.buffer_size, 1024 * 1024);
        assert_eq!(config.queue.capacity, 32);
        assert_eq!(config.upload.client_header, "x-trassnet-client");
        assert_eq!(config.upstream.max_attempts, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [upload]
            data_dir = "/var/lib/uploads"

            [timeouts]
            idle_secs = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.upload.data_dir, PathBuf::from("/var/lib/uploads"));
        assert_eq!(config.upload.route_marker, "/file/upload");
        assert_eq!(config.timeouts.idle_secs, 3);
        assert_eq!(config.timeouts.write_secs, 5);
        assert_eq!(config.listener, ListenerConfig::default());
    }
}
