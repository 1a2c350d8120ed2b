use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    pub webex: WebexConfig,
    pub meraki: MerakiConfig,
    pub location: LocationConfig,
    #[serde(default = "default_tunnel_config")]
    pub tunnel: TunnelConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for every outbound API call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebexConfig {
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_webex_base_url")]
    pub base_url: String,
    #[serde(default = "default_webhook_name")]
    pub webhook_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MerakiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_meraki_base_url")]
    pub base_url: String,
    pub org_id: String,
    pub default_network_id: String,
    /// External feed for `/meraki location get`; when unset the bot answers
    /// from the reports this server has received itself.
    #[serde(default)]
    pub location_url: Option<String>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocationConfig {
    #[serde(default)]
    pub validator: String,
    #[serde(default)]
    pub secret: String,
    /// The CMX JSON version this receiver understands
    #[serde(default = "default_location_version")]
    pub version: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TunnelConfig {
    #[serde(default = "default_tunnel_enabled")]
    pub enabled: bool,
    #[serde(default = "default_tunnel_api_url")]
    pub api_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5005
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_webex_base_url() -> String {
    "https://webexapis.com/v1".to_string()
}

fn default_webhook_name() -> String {
    "Webhook to ChatBot".to_string()
}

fn default_meraki_base_url() -> String {
    "https://api.meraki.com/api/v1".to_string()
}

fn default_command_prefix() -> String {
    "/meraki".to_string()
}

fn default_location_version() -> String {
    "2.0".to_string()
}

fn default_tunnel_enabled() -> bool {
    true
}

fn default_tunnel_api_url() -> String {
    "http://127.0.0.1:4040/api/tunnels".to_string()
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
        request_timeout_secs: default_request_timeout_secs(),
    }
}

fn default_tunnel_config() -> TunnelConfig {
    TunnelConfig {
        enabled: default_tunnel_enabled(),
        api_url: default_tunnel_api_url(),
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML configuration")
    }

    /// Secrets can be kept out of the config file and supplied through the environment.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides: [(&str, &mut String); 4] = [
            ("WEBEX_API_TOKEN", &mut self.webex.api_token),
            ("MERAKI_API_KEY", &mut self.meraki.api_key),
            ("LOCATION_SECRET", &mut self.location.secret),
            ("LOCATION_VALIDATOR", &mut self.location.validator),
        ];
        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = value;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.webex.api_token.is_empty() {
            anyhow::bail!("webex.api_token is not set (config file or WEBEX_API_TOKEN)");
        }
        if self.meraki.api_key.is_empty() {
            anyhow::bail!("meraki.api_key is not set (config file or MERAKI_API_KEY)");
        }
        if self.location.secret.is_empty() {
            anyhow::bail!("location.secret is not set (config file or LOCATION_SECRET)");
        }
        Ok(())
    }
}
