//! In-memory stand-ins for the remote APIs, used by unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::bot::AppState;
use crate::config::Config;
use crate::meraki::{Network, NetworkApi, Ssid};
use crate::webex::MessagingApi;

pub const BOT_ID: &str = "bot-person-id";

const TEST_CONFIG: &str = r#"
[webex]
api_token = "webex-token"

[meraki]
api_key = "meraki-key"
org_id = "549236"
default_network_id = "L_646829496481105433"

[location]
validator = "abc123"
secret = "simulator"
version = "2.0"

[tunnel]
enabled = false
"#;

pub fn test_config() -> Config {
    Config::parse(TEST_CONFIG).unwrap()
}

pub fn test_state(messenger: FakeMessenger, network: FakeNetwork) -> Arc<AppState> {
    test_state_with(test_config(), messenger, network)
}

pub fn test_state_with(
    config: Config,
    messenger: FakeMessenger,
    network: FakeNetwork,
) -> Arc<AppState> {
    Arc::new(AppState::new(
        config,
        BOT_ID.to_string(),
        Arc::new(messenger),
        Arc::new(network),
    ))
}

#[derive(Clone, Default)]
pub struct FakeMessenger {
    texts: Arc<Mutex<HashMap<String, String>>>,
    fetched: Arc<Mutex<Vec<String>>>,
    posted: Arc<Mutex<Vec<(String, String)>>>,
    webhook_targets: Arc<Mutex<Vec<String>>>,
    created: Arc<Mutex<Vec<String>>>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(self, message_id: &str, text: &str) -> Self {
        self.texts
            .lock()
            .unwrap()
            .insert(message_id.to_string(), text.to_string());
        self
    }

    pub fn with_webhook(self, target_url: &str) -> Self {
        self.webhook_targets
            .lock()
            .unwrap()
            .push(target_url.to_string());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    /// (room id, text) of every reply sent
    pub fn posted(&self) -> Vec<(String, String)> {
        self.posted.lock().unwrap().clone()
    }

    pub fn created_webhooks(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingApi for FakeMessenger {
    async fn resolve_identity(&self) -> Result<String> {
        Ok(BOT_ID.to_string())
    }

    async fn fetch_text(&self, message_id: &str) -> Result<String> {
        self.fetched.lock().unwrap().push(message_id.to_string());
        Ok(self
            .texts
            .lock()
            .unwrap()
            .get(message_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn post_reply(&self, room_id: &str, text: &str) -> Result<()> {
        self.posted
            .lock()
            .unwrap()
            .push((room_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn list_webhook_targets(&self) -> Result<Vec<String>> {
        Ok(self.webhook_targets.lock().unwrap().clone())
    }

    async fn create_webhook(&self, target_url: &str) -> Result<()> {
        self.created.lock().unwrap().push(target_url.to_string());
        self.webhook_targets
            .lock()
            .unwrap()
            .push(target_url.to_string());
        Ok(())
    }
}

#[derive(Clone)]
pub struct FakeNetwork {
    calls: Arc<Mutex<Vec<String>>>,
    failing: bool,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: false,
        }
    }

    /// Every operation returns an error
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn networks(&self) -> Vec<Network> {
        vec![
            Network {
                id: "L_646829496481105433".to_string(),
                name: "DevNet Sandbox".to_string(),
            },
            Network {
                id: "N_42".to_string(),
                name: "Branch Office".to_string(),
            },
        ]
    }

    pub fn location(&self) -> Value {
        json!({"apMac": "00:18:0a:13:dd:b0", "observations": [{"clientMac": "aa:bb"}]})
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing {
            anyhow::bail!("Meraki API error (500): boom");
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkApi for FakeNetwork {
    fn org_id(&self) -> &str {
        "549236"
    }

    fn default_network_id(&self) -> &str {
        "L_646829496481105433"
    }

    async fn list_networks(&self) -> Result<Vec<Network>> {
        self.record("list_networks".to_string())?;
        Ok(self.networks())
    }

    async fn list_ssids(&self, network_id: &str) -> Result<Vec<Ssid>> {
        self.record(format!("list_ssids {}", network_id))?;
        Ok(vec![
            Ssid {
                number: 0,
                name: "Guest".to_string(),
                enabled: true,
            },
            Ssid {
                number: 1,
                name: "Corp".to_string(),
                enabled: false,
            },
        ])
    }

    async fn start_location_scan(&self) -> Result<String> {
        self.record("start_location_scan".to_string())?;
        Ok("Location scanning started".to_string())
    }

    async fn get_location(&self) -> Result<Value> {
        self.record("get_location".to_string())?;
        Ok(self.location())
    }
}
