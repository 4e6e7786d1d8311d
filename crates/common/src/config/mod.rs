//! Configuration management for Gatewarden services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Cluster ingress addressing (public address derivation)
    pub cluster: ClusterConfig,

    /// Administrative port range for TCP/gRPC services
    pub ports: PortsConfig,

    /// Flow counter configuration
    pub flow: FlowConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

/// Where the proxy fleet terminates client traffic. Used only to derive the
/// human-facing address of a service in listings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Ingress IP or hostname of the proxy cluster
    #[serde(default = "default_cluster_ip")]
    pub ip: String,

    /// Plain HTTP ingress port
    #[serde(default = "default_cluster_port")]
    pub port: u16,

    /// TLS ingress port
    #[serde(default = "default_cluster_ssl_port")]
    pub ssl_port: u16,
}

/// Reserved administrative range for TCP/gRPC listener ports
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortsConfig {
    #[serde(default = "default_port_range_start")]
    pub range_start: u16,

    #[serde(default = "default_port_range_end")]
    pub range_end: u16,
}

impl PortsConfig {
    /// Check whether a candidate listener port falls inside the range
    pub fn contains(&self, port: i32) -> bool {
        port >= i32::from(self.range_start) && port <= i32::from(self.range_end)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlowConfig {
    /// IANA time zone the hour buckets are reported in
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 50 }
fn default_min_connections() -> u32 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_cluster_ip() -> String { "127.0.0.1".to_string() }
fn default_cluster_port() -> u16 { 8880 }
fn default_cluster_ssl_port() -> u16 { 4433 }
fn default_port_range_start() -> u16 { 8001 }
fn default_port_range_end() -> u16 { 8999 }
fn default_time_zone() -> String { "UTC".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "gatewarden".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }

    /// Resolve the configured reporting time zone
    pub fn time_zone(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.flow
            .time_zone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| ConfigError::Message(format!("invalid flow.time_zone: {}", e)))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/gatewarden".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            cluster: ClusterConfig {
                ip: default_cluster_ip(),
                port: default_cluster_port(),
                ssl_port: default_cluster_ssl_port(),
            },
            ports: PortsConfig {
                range_start: default_port_range_start(),
                range_end: default_port_range_end(),
            },
            flow: FlowConfig {
                time_zone: default_time_zone(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ports.range_start, 8001);
        assert_eq!(config.ports.range_end, 8999);
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/gatewarden");
    }

    #[test]
    fn test_port_range_contains() {
        let ports = AppConfig::default().ports;
        assert!(ports.contains(8001));
        assert!(ports.contains(8999));
        assert!(!ports.contains(8000));
        assert!(!ports.contains(9000));
    }

    #[test]
    fn test_default_time_zone_parses() {
        let config = AppConfig::default();
        assert!(config.time_zone().is_ok());
    }
}
