use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::WebexConfig;

/// The chat-platform operations the bot depends on.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// The bot's own person id
    async fn resolve_identity(&self) -> Result<String>;
    /// Text of a message; empty when the message carries no text
    async fn fetch_text(&self, message_id: &str) -> Result<String>;
    /// Best-effort: a rejected post is logged, only transport failures are errors.
    async fn post_reply(&self, room_id: &str, text: &str) -> Result<()>;
    async fn list_webhook_targets(&self) -> Result<Vec<String>>;
    async fn create_webhook(&self, target_url: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct Person {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMessage<'a> {
    room_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct WebhookList {
    items: Vec<Webhook>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Webhook {
    target_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewWebhook<'a> {
    name: &'a str,
    resource: &'a str,
    event: &'a str,
    target_url: &'a str,
}

pub struct WebexClient {
    client: reqwest::Client,
    config: WebexConfig,
}

impl WebexClient {
    pub fn new(config: WebexConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Webex HTTP client")?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .with_context(|| format!("Failed to send request to Webex: {}", path))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Webex API error on {} ({}): {}", path, status, error_body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse Webex response for {}", path))
    }
}

#[async_trait]
impl MessagingApi for WebexClient {
    async fn resolve_identity(&self) -> Result<String> {
        let me: Person = self
            .get_json("people/me")
            .await
            .context("Failed to resolve bot identity")?;
        info!("Bot identity resolved: {}", me.id);
        Ok(me.id)
    }

    async fn fetch_text(&self, message_id: &str) -> Result<String> {
        debug!("Fetching message {}", message_id);
        let message: Message = self.get_json(&format!("messages/{}", message_id)).await?;
        Ok(message.text.unwrap_or_default())
    }

    async fn post_reply(&self, room_id: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("messages"))
            .bearer_auth(&self.config.api_token)
            .json(&NewMessage { room_id, text })
            .send()
            .await
            .context("Failed to send message to Webex")?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        if status.is_success() {
            debug!(
                "Posted reply to room {}: {}",
                room_id,
                serde_json::to_string_pretty(&body).unwrap_or_default()
            );
        } else {
            warn!("Webex rejected reply to room {} ({}): {}", room_id, status, body);
        }
        Ok(())
    }

    async fn list_webhook_targets(&self) -> Result<Vec<String>> {
        let webhooks: WebhookList = self
            .get_json("webhooks")
            .await
            .context("Failed to list Webex webhooks")?;
        Ok(webhooks.items.into_iter().map(|w| w.target_url).collect())
    }

    async fn create_webhook(&self, target_url: &str) -> Result<()> {
        let request = NewWebhook {
            name: &self.config.webhook_name,
            resource: "all",
            event: "all",
            target_url,
        };

        let response = self
            .client
            .post(self.url("webhooks"))
            .bearer_auth(&self.config.api_token)
            .json(&request)
            .send()
            .await
            .context("Failed to send webhook registration to Webex")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Webex webhook registration failed ({}): {}", status, error_body);
        }

        info!("Webhook to {} created", target_url);
        Ok(())
    }
}
