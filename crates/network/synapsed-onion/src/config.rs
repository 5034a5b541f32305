//! Overlay configuration

use crate::address::AddressSpace;
use crate::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "SYNAPSED_ONION_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnionConfig {
    pub network: NetworkConfig,
    pub codec: CodecConfig,
    pub transport: TransportConfig,
}

/// Where the services listen and how addresses are partitioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub registry_port: u16,
    pub base_user_port: u16,
    pub max_users: u16,
    pub base_relay_port: u16,
    pub max_relays: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            registry_port: 8080,
            base_user_port: 3000,
            max_users: 1000,
            base_relay_port: 4000,
            max_relays: 1000,
        }
    }
}

/// Must be identical on every node: it fixes the wrapped-key length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub symmetric_key_bits: u16,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self { symmetric_key_bits: 256 }
    }
}

/// Settings for the HTTP transport collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Per-request timeout for outbound HTTP calls; `0` disables it.
    pub request_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { request_timeout_ms: 10_000 }
    }
}

impl OnionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.network.host = host.into();
        self
    }

    pub fn with_registry_port(mut self, port: u16) -> Self {
        self.network.registry_port = port;
        self
    }

    pub fn with_user_ports(mut self, base: u16, count: u16) -> Self {
        self.network.base_user_port = base;
        self.network.max_users = count;
        self
    }

    pub fn with_relay_ports(mut self, base: u16, count: u16) -> Self {
        self.network.base_relay_port = base;
        self.network.max_relays = count;
        self
    }

    pub fn with_symmetric_key_bits(mut self, bits: u16) -> Self {
        self.codec.symmetric_key_bits = bits;
        self
    }

    /// Reads a TOML file, applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RoutingError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RoutingError::InvalidConfig(format!("failed to parse config: {e}")))
    }

    /// Overrides individual settings from `SYNAPSED_ONION_*` variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(host) = var("HOST") {
            self.network.host = host;
        }
        if let Some(value) = var("REGISTRY_PORT") {
            self.network.registry_port = parse_env("REGISTRY_PORT", &value)?;
        }
        if let Some(value) = var("BASE_USER_PORT") {
            self.network.base_user_port = parse_env("BASE_USER_PORT", &value)?;
        }
        if let Some(value) = var("BASE_RELAY_PORT") {
            self.network.base_relay_port = parse_env("BASE_RELAY_PORT", &value)?;
        }
        if let Some(value) = var("MAX_USERS") {
            self.network.max_users = parse_env("MAX_USERS", &value)?;
        }
        if let Some(value) = var("MAX_RELAYS") {
            self.network.max_relays = parse_env("MAX_RELAYS", &value)?;
        }
        if let Some(value) = var("SYMMETRIC_KEY_BITS") {
            self.codec.symmetric_key_bits = parse_env("SYMMETRIC_KEY_BITS", &value)?;
        }
        if let Some(value) = var("REQUEST_TIMEOUT_MS") {
            self.transport.request_timeout_ms = parse_env("REQUEST_TIMEOUT_MS", &value)?;
        }
        Ok(())
    }

    /// Fails fast on settings that would let nodes disagree about framing
    /// or addressing.
    pub fn validate(&self) -> Result<()> {
        crate::codec::SymmetricCipher::from_key_bits(self.codec.symmetric_key_bits)?;

        let network = &self.network;
        let user_end = u32::from(network.base_user_port) + u32::from(network.max_users);
        let relay_end = u32::from(network.base_relay_port) + u32::from(network.max_relays);
        if user_end > u32::from(u16::MAX) + 1 || relay_end > u32::from(u16::MAX) + 1 {
            return Err(RoutingError::InvalidConfig(
                "user and relay ranges must fit in the TCP port space".to_string(),
            ));
        }

        let space = self.address_space()?;
        let registry = u32::from(network.registry_port);
        if space.recipient_range().contains(&registry) || space.relay_range().contains(&registry) {
            return Err(RoutingError::InvalidConfig(format!(
                "registry port {registry} collides with a node address range"
            )));
        }
        Ok(())
    }

    pub fn address_space(&self) -> Result<AddressSpace> {
        AddressSpace::new(
            u32::from(self.network.base_user_port),
            u32::from(self.network.max_users),
            u32::from(self.network.base_relay_port),
            u32::from(self.network.max_relays),
        )
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        RoutingError::InvalidConfig(format!("{ENV_PREFIX}{name} has invalid value {value:?}"))
    })
}
