use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::command::{self, Command, Intent, LocationAction};
use crate::config::Config;
use crate::location::{self, LocationStore};
use crate::meraki::NetworkApi;
use crate::webex::MessagingApi;

pub const SELF_IGNORED: &str = "Message from self ignored";

/// Shared application state, handed to every request handler
pub struct AppState {
    pub config: Config,
    /// Our own person id; notifications authored by it are ignored
    pub bot_id: String,
    pub messenger: Arc<dyn MessagingApi>,
    pub network: Arc<dyn NetworkApi>,
    pub location: LocationStore,
}

impl AppState {
    pub fn new(
        config: Config,
        bot_id: String,
        messenger: Arc<dyn MessagingApi>,
        network: Arc<dyn NetworkApi>,
    ) -> Self {
        Self {
            config,
            bot_id,
            messenger,
            network,
            location: LocationStore::new(),
        }
    }
}

/// Webex webhook notification, reduced to the fields the bot acts on
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Notification {
    #[serde(default)]
    resource: String,
    #[serde(default)]
    event: String,
    data: NotificationData,
}

/// Just the author, checked before anything else is required of the payload
#[derive(Debug, Deserialize)]
struct Authored {
    data: Author,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Author {
    person_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationData {
    /// Message id
    id: String,
    room_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Wrong data format")]
    WrongFormat,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::WrongFormat => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            WebhookError::Internal(e) => {
                error!("Error handling notification: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

pub(crate) fn has_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index).post(receive_notification))
        .route("/location", get(location::validator).post(location::receive))
        .route("/getlocation", get(location::latest))
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}

async fn index(State(state): State<Arc<AppState>>) -> String {
    format!("Request received on local port {}", state.config.server.port)
}

async fn receive_notification(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookError> {
    if !has_json_content_type(&headers) {
        return Err(WebhookError::WrongFormat);
    }

    let payload: Value = serde_json::from_slice(&body).map_err(|_| WebhookError::WrongFormat)?;
    let authored: Authored = parse_notification(&payload)?;
    if authored.data.person_id == state.bot_id {
        return Ok(SELF_IGNORED.into_response());
    }

    let notification: Notification = parse_notification(&payload)?;

    debug!(
        "Notification ({} {}): {}",
        notification.resource,
        notification.event,
        serde_json::to_string_pretty(&payload).unwrap_or_default()
    );

    handle_message(&state, &notification.data).await?;

    Ok(Json(payload).into_response())
}

fn parse_notification<T: serde::de::DeserializeOwned>(
    payload: &Value,
) -> Result<T, WebhookError> {
    T::deserialize(payload).map_err(|e| {
        debug!("Notification missing required fields: {}", e);
        WebhookError::WrongFormat
    })
}

async fn handle_message(state: &AppState, data: &NotificationData) -> Result<()> {
    let text = state.messenger.fetch_text(&data.id).await?;
    info!("Message {} in room {}: {}", data.id, data.room_id, text);

    let reply = match Intent::from_text(&text, &state.config.meraki.command_prefix) {
        Intent::Echo(text) => command::echo_reply(&text),
        Intent::Command(cmd) => run_command(state, cmd).await?,
    };

    state.messenger.post_reply(&data.room_id, &reply).await
}

async fn run_command(state: &AppState, cmd: Command) -> Result<String> {
    let network = &state.network;
    let prefix = &state.config.meraki.command_prefix;

    let reply = match cmd {
        Command::Networks => {
            let networks = network.list_networks().await?;
            command::networks_reply(network.org_id(), &networks)
        }
        Command::Ssids { network_id } => {
            let network_id = network_id
                .as_deref()
                .unwrap_or_else(|| network.default_network_id());
            let ssids = network.list_ssids(network_id).await?;
            command::ssids_reply(network_id, &ssids)
        }
        Command::Location(LocationAction::StartScan) => network.start_location_scan().await?,
        Command::Location(LocationAction::Get) if state.config.meraki.location_url.is_some() => {
            let location = network.get_location().await?;
            serde_json::to_string_pretty(&location).context("Failed to format location data")?
        }
        Command::Location(LocationAction::Get) => state.location.latest().await.to_reply(),
        Command::Location(LocationAction::Unsupported(action)) => {
            command::unsupported_location_reply(prefix, &action)
        }
        Command::Unrecognized(action) => command::unrecognized_reply(prefix, &action),
    };
    Ok(reply)
}
