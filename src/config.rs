//! Agent configuration
//!
//! Configuration is a TOML file with one section per concern, loaded once
//! at startup. The credential never lives in the file; the file names the
//! environment variable that holds it and resolution happens at runtime.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use url::Url;

use crate::protocol::DeviceIdentity;
use crate::telemetry::{unit_for, Metric, SendMode, DEFAULT_SEND_INTERVAL_MS, MIN_SEND_INTERVAL_MS};
use crate::transport::ws::DEFAULT_RECONNECT_INTERVAL_MS;

/// Main agent configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub device: DeviceSection,
    pub server: ServerSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

/// Device identity section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device name (must match [a-zA-Z0-9._-]+)
    pub name: String,
    /// Metric kinds this device reports. Fixed for the process lifetime.
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,
}

/// Ingestion server section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Environment variable containing the API key
    pub api_key_env: String,
    /// Fixed reconnect interval in milliseconds (default: 5000)
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Telemetry scheduling section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    /// Send period in milliseconds (default: 10000, minimum: 1000)
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
    /// Send mode: "combined" or "per-metric" (default: combined)
    #[serde(default)]
    pub mode: SendMode,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            send_interval_ms: DEFAULT_SEND_INTERVAL_MS,
            mode: SendMode::default(),
        }
    }
}

fn default_capabilities() -> Vec<String> {
    ["temperature", "humidity", "pressure", "light"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_reconnect_interval_ms() -> u64 {
    DEFAULT_RECONNECT_INTERVAL_MS
}

fn default_send_interval_ms() -> u64 {
    DEFAULT_SEND_INTERVAL_MS
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid device name: {0}")]
    InvalidDeviceName(String),
    #[error("Invalid server address: {0}")]
    InvalidServerAddress(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AgentConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field formats and ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_name(&self.device.name)?;

        if self.device.capabilities.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "device capabilities must not be empty".to_string(),
            ));
        }
        for kind in &self.device.capabilities {
            if unit_for(kind).is_none() {
                return Err(ConfigError::InvalidConfig(format!(
                    "unknown capability '{kind}'"
                )));
            }
        }

        if self.telemetry.send_interval_ms < MIN_SEND_INTERVAL_MS {
            return Err(ConfigError::InvalidConfig(format!(
                "send_interval_ms {} below minimum {MIN_SEND_INTERVAL_MS}",
                self.telemetry.send_interval_ms
            )));
        }

        if self.server.reconnect_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "reconnect_interval_ms must be positive".to_string(),
            ));
        }

        // Catch bad host values at load time rather than on first dial.
        self.server_url()?;

        Ok(())
    }

    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.server.api_key_env)
            .map_err(|_| ConfigError::EnvVarNotFound(self.server.api_key_env.clone()))
    }

    /// Websocket URL of the ingestion server.
    pub fn server_url(&self) -> Result<Url, ConfigError> {
        let address = format!("ws://{}:{}/", self.server.host, self.server.port);
        Url::parse(&address).map_err(|_| ConfigError::InvalidServerAddress(address))
    }

    /// Device identity configured for this agent.
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.device.name.clone(), self.device.capabilities.clone())
    }

    /// Tracked metrics with their units. Unknown kinds were rejected by
    /// [`validate`](Self::validate).
    pub fn metrics(&self) -> Vec<Metric> {
        self.device
            .capabilities
            .iter()
            .filter_map(|kind| Metric::for_kind(kind))
            .collect()
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
name = "test-device"
capabilities = ["temperature", "humidity"]

[server]
host = "localhost"
port = 5000
api_key_env = "INGEST_API_KEY"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate device name format.
fn validate_device_name(name: &str) -> Result<(), ConfigError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if name.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeviceName(format!(
            "Device name '{name}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[device]
name = "esp32-lab-01"
capabilities = ["temperature", "light"]

[server]
host = "ingest.example.net"
port = 5000
api_key_env = "INGEST_API_KEY"
reconnect_interval_ms = 2500

[telemetry]
send_interval_ms = 5000
mode = "per-metric"
"#;

        let config: AgentConfig = toml::from_str(toml_content).unwrap();
        config.validate().unwrap();

        assert_eq!(config.device.name, "esp32-lab-01");
        assert_eq!(config.device.capabilities, vec!["temperature", "light"]);
        assert_eq!(config.server.host, "ingest.example.net");
        assert_eq!(config.server.reconnect_interval_ms, 2500);
        assert_eq!(config.telemetry.send_interval_ms, 5000);
        assert_eq!(config.telemetry.mode, SendMode::PerMetric);
    }

    #[test]
    fn test_minimal_config_applies_defaults() {
        let toml_content = r#"
[device]
name = "minimal"

[server]
host = "localhost"
port = 5000
api_key_env = "INGEST_API_KEY"
"#;

        let config: AgentConfig = toml::from_str(toml_content).unwrap();
        config.validate().unwrap();

        assert_eq!(
            config.device.capabilities,
            vec!["temperature", "humidity", "pressure", "light"]
        );
        assert_eq!(config.server.reconnect_interval_ms, 5000);
        assert_eq!(config.telemetry.send_interval_ms, 10_000);
        assert_eq!(config.telemetry.mode, SendMode::Combined);
    }

    #[test]
    fn test_invalid_device_name() {
        let result = validate_device_name("bad name!");
        assert!(result.is_err());

        let result = validate_device_name("valid-device_01.test");
        assert!(result.is_ok());
    }

    #[test]
    fn test_unknown_capability_rejected() {
        let mut config = AgentConfig::test_config();
        config.device.capabilities.push("co2".to_string());

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_sub_minimum_send_interval_rejected() {
        let mut config = AgentConfig::test_config();
        config.telemetry.send_interval_ms = 500;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_server_url_assembly() {
        let config = AgentConfig::test_config();
        assert_eq!(config.server_url().unwrap().as_str(), "ws://localhost:5000/");
    }

    #[test]
    fn test_metrics_resolve_units() {
        let config = AgentConfig::test_config();
        let metrics = config.metrics();

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].kind, "temperature");
        assert_eq!(metrics[0].unit, "celsius");
        assert_eq!(metrics[1].kind, "humidity");
        assert_eq!(metrics[1].unit, "percent");
    }

    #[test]
    fn test_api_key_env_resolution() {
        let mut config = AgentConfig::test_config();
        config.server.api_key_env = "IOTAGENT_TEST_KEY_PRESENT".to_string();

        std::env::set_var("IOTAGENT_TEST_KEY_PRESENT", "secret");
        assert_eq!(config.api_key().unwrap(), "secret");

        config.server.api_key_env = "IOTAGENT_TEST_KEY_ABSENT".to_string();
        assert!(matches!(
            config.api_key(),
            Err(ConfigError::EnvVarNotFound(_))
        ));
    }
}
