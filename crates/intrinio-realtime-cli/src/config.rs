/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed stream configuration and client settings
[POS]:    Configuration layer - stream setup
[UPDATE]: When adding new configuration options
*/

use std::time::Duration;

use anyhow::{Context, Result, bail};
use intrinio_realtime::{ClientConfig, Credentials, Provider};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the stream reader
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// API username
    pub username: String,
    /// API password
    pub password: String,
    /// Provider selector: "iex" or "quodd"
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Channels joined after connecting
    #[serde(default)]
    pub channels: Vec<String>,
    /// Stop after this many seconds; runs until a signal when absent
    #[serde(default)]
    pub duration_secs: Option<u64>,
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub socket_url: Option<String>,
    #[serde(default)]
    pub heartbeat_secs: Option<u64>,
}

fn default_provider() -> String {
    "iex".to_string()
}

impl StreamConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("parse yaml")?;
        Ok(config)
    }

    /// Check everything the client would otherwise reject at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            bail!("username must not be empty");
        }
        if self.password.is_empty() {
            bail!("password must not be empty");
        }
        self.provider()?;
        if self.channels.iter().all(|channel| channel.trim().is_empty()) {
            bail!("at least one channel is required");
        }
        if self.heartbeat_secs == Some(0) {
            bail!("heartbeat_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn provider(&self) -> Result<Provider> {
        self.provider
            .parse::<Provider>()
            .with_context(|| format!("unsupported provider '{}'", self.provider))
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    /// Client settings with the configured overrides applied.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig {
            auth_url: self.auth_url.clone(),
            socket_url: self.socket_url.clone(),
            ..ClientConfig::default()
        };
        if let Some(secs) = self.heartbeat_secs {
            config = config.with_heartbeat_interval(Duration::from_secs(secs));
        }
        config
    }
}
