use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::MerakiConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Network {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ssid {
    pub number: u32,
    pub name: String,
    pub enabled: bool,
}

/// The wireless-management operations the bot depends on.
#[async_trait]
pub trait NetworkApi: Send + Sync {
    fn org_id(&self) -> &str;
    fn default_network_id(&self) -> &str;
    async fn list_networks(&self) -> Result<Vec<Network>>;
    async fn list_ssids(&self, network_id: &str) -> Result<Vec<Ssid>>;
    /// Returns a human-readable status line
    async fn start_location_scan(&self) -> Result<String>;
    /// Last-known location data from the configured external feed, forwarded as-is
    async fn get_location(&self) -> Result<Value>;
}

pub struct MerakiClient {
    client: reqwest::Client,
    config: MerakiConfig,
}

impl MerakiClient {
    pub fn new(config: MerakiConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Meraki HTTP client")?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Meraki API error on {} ({}): {}", what, status, error_body);
        }
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .with_context(|| format!("Failed to send request to Meraki: {}", path))?;

        Self::check(response, path)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse Meraki response for {}", path))
    }
}

#[async_trait]
impl NetworkApi for MerakiClient {
    fn org_id(&self) -> &str {
        &self.config.org_id
    }

    fn default_network_id(&self) -> &str {
        &self.config.default_network_id
    }

    async fn list_networks(&self) -> Result<Vec<Network>> {
        self.get_json(&format!("organizations/{}/networks", self.config.org_id))
            .await
    }

    async fn list_ssids(&self, network_id: &str) -> Result<Vec<Ssid>> {
        self.get_json(&format!("networks/{}/wireless/ssids", network_id))
            .await
    }

    async fn start_location_scan(&self) -> Result<String> {
        let network_id = &self.config.default_network_id;
        let path = format!("networks/{}/locationScanning", network_id);

        let response = self
            .client
            .put(self.url(&path))
            .bearer_auth(&self.config.api_key)
            .json(&json!({ "analyticsEnabled": true, "scanningApiEnabled": true }))
            .send()
            .await
            .context("Failed to send location scanning request to Meraki")?;
        Self::check(response, &path).await?;

        info!("Location scanning enabled on network {}", network_id);
        Ok(format!("Location scanning started on network {}", network_id))
    }

    async fn get_location(&self) -> Result<Value> {
        let url = self
            .config
            .location_url
            .as_deref()
            .context("No location feed configured (meraki.location_url)")?;

        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to fetch location data")?;

        Self::check(response, url)
            .await?
            .json()
            .await
            .context("Location data is not valid JSON")
    }
}
