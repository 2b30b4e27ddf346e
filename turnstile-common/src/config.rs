//! Configuration types for the Turnstile server and workload driver

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration, shared by the server and client binaries
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TurnstileConfig {
    /// Server listening settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Admission gate settings
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Shutdown snapshot settings
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Workload driver settings (client binary only)
    #[serde(default)]
    pub workload: WorkloadConfig,

    /// Health checker settings (client binary only)
    #[serde(default)]
    pub health: HealthConfig,
}

/// Server listening configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable access logging
    #[serde(default = "default_true")]
    pub access_log: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            access_log: true,
        }
    }
}

/// Admission gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Maximum number of write requests allowed in flight at once.
    /// Requests beyond this cap are rejected, never queued.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

/// Shutdown snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// File the final statistics snapshot is written to
    #[serde(default = "default_snapshot_path")]
    pub path: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

/// Workload driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Base URL of the server under load
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Identities of the simulated clients
    #[serde(default = "default_clients")]
    pub clients: Vec<String>,

    /// Worker tasks per simulated client
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Requests issued by each worker
    #[serde(default = "default_requests_per_worker")]
    pub requests_per_worker: usize,

    /// Milliseconds between request slots, shared by a client's workers
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            clients: default_clients(),
            workers: default_workers(),
            requests_per_worker: default_requests_per_worker(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Health checker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Enable the periodic liveness poll
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between liveness polls
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_health_interval(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_max_in_flight() -> usize {
    5
}

fn default_snapshot_path() -> String {
    "client_stats.json".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_clients() -> Vec<String> {
    vec!["Client1".to_string(), "Client2".to_string()]
}

fn default_workers() -> usize {
    2
}

fn default_requests_per_worker() -> usize {
    100
}

fn default_tick_interval_ms() -> u64 {
    200
}

fn default_health_interval() -> u64 {
    5
}

impl TurnstileConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.admission.max_in_flight == 0 {
            return Err(ConfigError::ValidationError(
                "Admission capacity cannot be 0".to_string(),
            ));
        }

        if self.workload.workers == 0 {
            return Err(ConfigError::ValidationError(
                "Workload needs at least one worker per client".to_string(),
            ));
        }

        if self.workload.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Workload tick interval cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TurnstileConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.admission.max_in_flight, 5);
        assert_eq!(config.snapshot.path, "client_stats.json");
        assert_eq!(config.workload.clients.len(), 2);
        assert_eq!(config.workload.workers, 2);
        assert_eq!(config.workload.requests_per_worker, 100);
        assert!(config.health.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
bind_address = "127.0.0.1"
port = 3000

[admission]
max_in_flight = 16

[snapshot]
path = "/tmp/final_stats.json"

[workload]
base_url = "http://127.0.0.1:3000"
clients = ["Alpha", "Beta", "Gamma"]
workers = 4
requests_per_worker = 50
tick_interval_ms = 100

[health]
enabled = false
interval_secs = 10
"#;

        let config = TurnstileConfig::from_toml(toml).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.admission.max_in_flight, 16);
        assert_eq!(config.snapshot.path, "/tmp/final_stats.json");
        assert_eq!(config.workload.clients, vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(config.workload.workers, 4);
        assert!(!config.health.enabled);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let toml = r#"
[server]
port = 9000
"#;
        let config = TurnstileConfig::from_toml(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.admission.max_in_flight, 5);
        assert_eq!(config.workload.tick_interval_ms, 200);
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = TurnstileConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = TurnstileConfig::default();
        config.admission.max_in_flight = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = TurnstileConfig::default();
        let toml_string = config.to_toml().unwrap();
        assert!(toml_string.contains("max_in_flight"));

        let parsed = TurnstileConfig::from_toml(&toml_string).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.admission.max_in_flight, config.admission.max_in_flight);
        assert_eq!(parsed.workload.clients, config.workload.clients);
    }
}
