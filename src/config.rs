// Copyright (c) 2025 - Cowboy AI, Inc.
//! Broker configuration.
//!
//! Loaded from a TOML file at startup; nothing in the core reads the
//! environment or the filesystem directly once a [`BrokerConfig`] has been
//! constructed.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a [`BrokerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("network name must not be empty")]
    EmptyNetworkName,

    #[error("leg timeout must be greater than zero")]
    ZeroLegTimeout,
}

/// This broker instance's identity and operating parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// The network name this broker manages locally (its `managing_nsa`
    /// identity in the topology).
    pub network_name: String,

    /// The URN identifying this broker to its peers.
    pub nsa_urn: String,

    /// Deadline applied to every outbound leg RPC (local or remote).
    #[serde(with = "humantime_seconds", default = "default_leg_timeout")]
    pub leg_timeout: Duration,

    /// Bounded retry count for a connection-id collision on `Reserve`.
    #[serde(default = "default_id_retry_attempts")]
    pub id_retry_attempts: u8,

    /// NATS connection URL for remote-locality dispatch; absent when this
    /// broker has no remote peers configured.
    pub nats_url: Option<String>,
}

fn default_leg_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_id_retry_attempts() -> u8 {
    3
}

impl BrokerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: BrokerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.network_name.trim().is_empty() {
            return Err(ConfigError::EmptyNetworkName);
        }
        if self.leg_timeout.is_zero() {
            return Err(ConfigError::ZeroLegTimeout);
        }
        Ok(())
    }
}

mod humantime_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let raw = r#"
            network_name = "northernlight.ets"
            nsa_urn = "urn:ogf:network:nordu.net:2013:nsa:northernlight"
            leg_timeout = 15
        "#;
        let config = BrokerConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.network_name, "northernlight.ets");
        assert_eq!(config.leg_timeout, Duration::from_secs(15));
        assert_eq!(config.id_retry_attempts, 3);
        assert!(config.nats_url.is_none());
    }

    #[test]
    fn rejects_empty_network_name() {
        let raw = r#"
            network_name = ""
            nsa_urn = "urn:ogf:network:test"
            leg_timeout = 15
        "#;
        assert!(matches!(
            BrokerConfig::from_toml_str(raw),
            Err(ConfigError::EmptyNetworkName)
        ));
    }

    #[test]
    fn rejects_zero_leg_timeout() {
        let raw = r#"
            network_name = "test.net"
            nsa_urn = "urn:ogf:network:test"
            leg_timeout = 0
        "#;
        assert!(matches!(
            BrokerConfig::from_toml_str(raw),
            Err(ConfigError::ZeroLegTimeout)
        ));
    }
}
