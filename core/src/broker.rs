//! Named broker configurations and the registry that resolves them.
//!
//! An application declares every broker it might run against (local,
//! staging, production, ...) up front; exactly one is selected by name at
//! launch. The registry is consulted once at process start and is read-only
//! afterwards.
//!
//! # Example
//!
//! ```
//! use streambind_core::broker::{BrokerConfig, BrokerRegistry, TransportSecurity};
//!
//! let mut brokers = BrokerRegistry::new();
//! brokers.register(BrokerConfig::new("local", "localhost", 9092));
//! brokers.register(
//!     BrokerConfig::new("production", "kafka.internal", 9092)
//!         .security(TransportSecurity::Tls)
//!         .description("production cluster"),
//! );
//!
//! let active = brokers.resolve("production").unwrap();
//! assert_eq!(active.bootstrap(), "kafka.internal:9092");
//! ```

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transport security mode for a broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportSecurity {
    /// Plaintext TCP (development and trusted networks).
    #[default]
    Plaintext,
    /// TLS-encrypted transport.
    Tls,
}

/// A named broker configuration.
///
/// Immutable after declaration; the builder-style setters are consumed
/// during registration and never called on a resolved config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Unique name within a [`BrokerRegistry`].
    pub name: String,
    /// Broker host name or address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Transport security mode.
    pub security: TransportSecurity,
    /// Human-readable description, shown in diagnostics.
    pub description: String,
}

impl BrokerConfig {
    /// Create a plaintext config with an empty description.
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            security: TransportSecurity::Plaintext,
            description: String::new(),
        }
    }

    /// Set the transport security mode.
    #[must_use]
    pub const fn security(mut self, security: TransportSecurity) -> Self {
        self.security = security;
        self
    }

    /// Set the human-readable description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The `host:port` bootstrap address handed to the transport.
    #[must_use]
    pub fn bootstrap(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Registry of named broker configurations.
///
/// Registration is last-write-wins by name. Resolution of an unregistered
/// name is a fatal [`ConfigurationError::UnknownBroker`].
#[derive(Debug, Clone, Default)]
pub struct BrokerRegistry {
    // BTreeMap keeps the diagnostic list of known names stable.
    configs: BTreeMap<String, BrokerConfig>,
}

impl BrokerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            configs: BTreeMap::new(),
        }
    }

    /// Add or replace a configuration under its own name.
    pub fn register(&mut self, config: BrokerConfig) {
        tracing::debug!(
            broker = %config.name,
            bootstrap = %config.bootstrap(),
            "broker registered"
        );
        self.configs.insert(config.name.clone(), config);
    }

    /// Resolve the active broker by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownBroker`] naming the registered
    /// alternatives when `name` is absent.
    pub fn resolve(&self, name: &str) -> Result<&BrokerConfig, ConfigurationError> {
        self.configs
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownBroker {
                name: name.to_string(),
                known: self.configs.keys().cloned().collect(),
            })
    }

    /// Names of every registered broker.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.configs.keys().cloned().collect()
    }

    /// Whether no brokers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn resolve_returns_registered_config() {
        let mut registry = BrokerRegistry::new();
        registry.register(BrokerConfig::new("local", "localhost", 9092));
        registry.register(
            BrokerConfig::new("prod", "kafka.internal", 9093).security(TransportSecurity::Tls),
        );

        let prod = registry.resolve("prod").unwrap();
        assert_eq!(prod.bootstrap(), "kafka.internal:9093");
        assert_eq!(prod.security, TransportSecurity::Tls);
    }

    #[test]
    fn resolve_unknown_name_fails_with_unknown_broker() {
        let mut registry = BrokerRegistry::new();
        registry.register(BrokerConfig::new("local", "localhost", 9092));
        registry.register(BrokerConfig::new("prod", "kafka.internal", 9092));

        let err = registry.resolve("staging").unwrap_err();
        match err {
            ConfigurationError::UnknownBroker { name, known } => {
                assert_eq!(name, "staging");
                assert_eq!(known, vec!["local".to_string(), "prod".to_string()]);
            }
            other => panic!("expected UnknownBroker, got {other:?}"),
        }
    }

    #[test]
    fn registration_is_last_write_wins() {
        let mut registry = BrokerRegistry::new();
        registry.register(BrokerConfig::new("local", "localhost", 9092));
        registry.register(BrokerConfig::new("local", "127.0.0.1", 19092));

        assert_eq!(registry.resolve("local").unwrap().bootstrap(), "127.0.0.1:19092");
        assert_eq!(registry.names().len(), 1);
    }
}
