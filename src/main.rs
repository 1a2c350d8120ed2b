mod bot;
mod command;
mod config;
mod location;
mod meraki;
mod registrar;
#[cfg(test)]
mod testing;
mod webex;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;
use crate::meraki::MerakiClient;
use crate::registrar::{NgrokClient, Registration};
use crate::webex::{MessagingApi, WebexClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,meraki_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Listen: {}", config.server.bind_addr());
    info!("  Meraki organization: {}", config.meraki.org_id);
    info!("  Default network: {}", config.meraki.default_network_id);
    info!("  Command prefix: {}", config.meraki.command_prefix);

    let timeout = config.server.request_timeout();
    let webex = Arc::new(WebexClient::new(config.webex.clone(), timeout)?);
    let meraki = Arc::new(MerakiClient::new(config.meraki.clone(), timeout)?);

    let bot_id = webex.resolve_identity().await?;

    if config.tunnel.enabled {
        let ngrok = NgrokClient::new(config.tunnel.api_url.clone(), config.server.port, timeout)?;
        match registrar::ensure_webhook(&ngrok, &*webex)
            .await
            .context("Failed to register Webex webhook")?
        {
            Registration::Existing(url) => info!("Using existing webhook to {}", url),
            Registration::Created(url) => info!("Created webhook to {}", url),
        }
    } else {
        info!("Tunnel discovery disabled, skipping webhook registration");
    }

    let state = Arc::new(AppState::new(config, bot_id, webex, meraki));

    info!("Bot is starting...");
    bot::run(state).await?;

    Ok(())
}
