//! One-shot webhook registration at startup.
//!
//! Asks the local ngrok agent for its public URLs and makes sure a Webex
//! webhook points at one of them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::webex::MessagingApi;

#[async_trait]
pub trait TunnelApi: Send + Sync {
    async fn public_urls(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct TunnelList {
    tunnels: Vec<Tunnel>,
}

#[derive(Debug, Deserialize)]
struct Tunnel {
    public_url: String,
}

/// Client for the ngrok agent's local inspection API
pub struct NgrokClient {
    client: reqwest::Client,
    api_url: String,
    local_port: u16,
}

impl NgrokClient {
    pub fn new(api_url: String, local_port: u16, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build ngrok HTTP client")?;
        Ok(Self {
            client,
            api_url,
            local_port,
        })
    }
}

#[async_trait]
impl TunnelApi for NgrokClient {
    async fn public_urls(&self) -> Result<Vec<String>> {
        let hint = || {
            format!(
                "ngrok is not running at {}. Start it first with 'ngrok http {}'",
                self.api_url, self.local_port
            )
        };

        let list: TunnelList = self
            .client
            .get(&self.api_url)
            .send()
            .await
            .with_context(hint)?
            .error_for_status()
            .with_context(hint)?
            .json()
            .await
            .context("Failed to parse ngrok tunnel list")?;

        Ok(list.tunnels.into_iter().map(|t| t.public_url).collect())
    }
}

#[derive(Debug, PartialEq)]
pub enum Registration {
    Existing(String),
    Created(String),
}

/// Register a webhook for the first tunnel URL unless one is already registered.
pub async fn ensure_webhook(
    tunnel: &dyn TunnelApi,
    messenger: &dyn MessagingApi,
) -> Result<Registration> {
    let tunnel_urls = tunnel.public_urls().await?;
    let first = tunnel_urls
        .first()
        .cloned()
        .context("ngrok reports no active tunnels")?;

    let targets = messenger.list_webhook_targets().await?;
    if let Some(existing) = tunnel_urls.into_iter().find(|url| targets.contains(url)) {
        return Ok(Registration::Existing(existing));
    }

    messenger.create_webhook(&first).await?;
    Ok(Registration::Created(first))
}
