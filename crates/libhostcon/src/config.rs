use std::path::Path;
use std::time::Duration;

use hostcon_protocol::paths;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct HostconConfig {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

impl HostconConfig {
    /// Load from `path`, or from the default config location when `None`.
    ///
    /// A missing file at the default location yields the defaults; a
    /// missing file at an explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = paths::config_path();
        let (path, explicit) = match path {
            Some(path) => (path, true),
            None => (default_path.as_path(), false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

/// Where and how the command channel binds.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelConfig {
    pub bind_host: String,
    pub start_port: u16,
    /// Ports tried before giving up; `0` retries until a port binds.
    pub max_bind_attempts: u32,
    pub bind_backoff_ms: u64,
}

impl ChannelConfig {
    pub fn bind_backoff(&self) -> Duration {
        Duration::from_millis(self.bind_backoff_ms)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            start_port: paths::CHANNEL_START_PORT,
            max_bind_attempts: 1000,
            bind_backoff_ms: 1,
        }
    }
}

/// Registration of the session relay.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub allow_public_attrs: bool,
}

impl RelayConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: paths::RELAY_HOST.to_string(),
            port: paths::RELAY_PORT,
            allow_public_attrs: true,
        }
    }
}
