// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP / WebSocket listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent WebSocket sessions
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Disable the embedded dashboard (API only)
    #[serde(default)]
    pub api_only: bool,
}

/// Broker connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Use TLS (mqtts)
    #[serde(default = "default_true")]
    pub tls: bool,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

/// Snapshot storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Scheduled save cadence in seconds
    #[serde(default = "default_save_interval")]
    pub save_interval_secs: u64,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_clients() -> usize {
    100
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    8883
}

fn default_true() -> bool {
    true
}

fn default_client_id() -> String {
    "greenhouse-bridge".to_string()
}

/// Smallest non-zero keep-alive the MQTT client accepts
pub const MIN_KEEP_ALIVE_SECS: u64 = 5;

fn default_keep_alive() -> u64 {
    30
}

fn default_db_path() -> String {
    "greenhouse.db".to_string()
}

fn default_save_interval() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_clients: default_max_clients(),
            api_only: false,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            tls: true,
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            save_interval_secs: default_save_interval(),
        }
    }
}

impl StorageConfig {
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }
}

impl BridgeConfig {
    /// Create a new config builder
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML (used by `gen-config`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.host.trim().is_empty() {
            return Err(ConfigError::Invalid("MQTT host is empty".into()));
        }
        if self.mqtt.port == 0 {
            return Err(ConfigError::Invalid("MQTT port must be non-zero".into()));
        }
        if (1..MIN_KEEP_ALIVE_SECS).contains(&self.mqtt.keep_alive_secs) {
            return Err(ConfigError::Invalid(format!(
                "keep_alive_secs must be 0 (disabled) or at least {}",
                MIN_KEEP_ALIVE_SECS
            )));
        }
        if self.storage.save_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "save_interval_secs must be at least 1".into(),
            ));
        }
        if self.server.max_clients == 0 {
            return Err(ConfigError::Invalid("max_clients must be at least 1".into()));
        }
        if self.mqtt.username.is_some() != self.mqtt.password.is_some() {
            return Err(ConfigError::Invalid(
                "MQTT username and password must be set together".into(),
            ));
        }
        Ok(())
    }

    /// Listener address as `bind:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

/// Config builder for fluent API
#[derive(Debug, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.config.server.bind = bind.into();
        self
    }

    pub fn max_clients(mut self, max: usize) -> Self {
        self.config.server.max_clients = max;
        self
    }

    pub fn api_only(mut self, api_only: bool) -> Self {
        self.config.server.api_only = api_only;
        self
    }

    pub fn mqtt_host(mut self, host: impl Into<String>) -> Self {
        self.config.mqtt.host = host.into();
        self
    }

    pub fn mqtt_port(mut self, port: u16) -> Self {
        self.config.mqtt.port = port;
        self
    }

    /// Set broker credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.mqtt.username = Some(username.into());
        self.config.mqtt.password = Some(password.into());
        self
    }

    pub fn tls(mut self, tls: bool) -> Self {
        self.config.mqtt.tls = tls;
        self
    }

    pub fn keep_alive_secs(mut self, secs: u64) -> Self {
        self.config.mqtt.keep_alive_secs = secs;
        self
    }

    pub fn db_path(mut self, path: impl Into<String>) -> Self {
        self.config.storage.db_path = path.into();
        self
    }

    pub fn save_interval_secs(mut self, secs: u64) -> Self {
        self.config.storage.save_interval_secs = secs;
        self
    }

    /// Build the configuration
    pub fn build(self) -> BridgeConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = BridgeConfig::default();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.mqtt.port, 8883);
        assert!(config.mqtt.tls);
        assert_eq!(config.storage.save_interval_secs, 30);
        assert_eq!(config.storage.save_interval(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = BridgeConfig::builder()
            .port(8080)
            .mqtt_host("broker.local")
            .mqtt_port(1883)
            .tls(false)
            .credentials("user", "secret")
            .save_interval_secs(5)
            .build();

        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.username.as_deref(), Some("user"));
        assert_eq!(config.storage.save_interval_secs, 5);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = BridgeConfig::from_toml(
            r#"
            [mqtt]
            host = "broker.example.com"
            tls = false
            "#,
        )
        .unwrap();

        assert_eq!(config.mqtt.host, "broker.example.com");
        assert_eq!(config.mqtt.port, 8883);
        assert!(!config.mqtt.tls);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = BridgeConfig::from_toml("[storage]\nsave_interval_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = BridgeConfig::from_toml("[mqtt]\nusername = \"only-user\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_keep_alive_bounds() {
        let err = BridgeConfig::builder().keep_alive_secs(3).build().validate().unwrap_err();
        assert!(err.to_string().contains("keep_alive_secs"));

        assert!(BridgeConfig::builder().keep_alive_secs(0).build().validate().is_ok());
        assert!(BridgeConfig::builder().keep_alive_secs(5).build().validate().is_ok());

        let err = BridgeConfig::from_toml("[mqtt]\nkeep_alive_secs = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_file_roundtrip() {
        let config = BridgeConfig::builder().port(4000).db_path("/tmp/gh.db").build();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

        let loaded = BridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.server.port, 4000);
        assert_eq!(loaded.storage.db_path, "/tmp/gh.db");
    }
}
