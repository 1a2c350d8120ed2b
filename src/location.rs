//! Receiver for Meraki location-scanning (CMX) callbacks.
//!
//! The scanning network first GETs `/location` and expects the validator
//! token back, then POSTs device reports. Only the latest accepted report is
//! kept; `/getlocation` serves it verbatim.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bot::{has_json_content_type, AppState};
use crate::config::LocationConfig;

pub const PLACEHOLDER: &str = "Location Data Holder";
pub const ACCEPTED: &str = "Location Scanning POST Received";

/// Why a beacon POST was refused. The display text is the response body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BeaconRejection {
    #[error("invalid data")]
    InvalidData,
    #[error("invalid secret")]
    InvalidSecret,
    #[error("invalid version")]
    InvalidVersion,
    #[error("invalid device type")]
    InvalidDeviceType,
}

impl BeaconRejection {
    fn status(&self) -> StatusCode {
        match self {
            BeaconRejection::InvalidData | BeaconRejection::InvalidVersion => {
                StatusCode::BAD_REQUEST
            }
            BeaconRejection::InvalidSecret | BeaconRejection::InvalidDeviceType => {
                StatusCode::FORBIDDEN
            }
        }
    }
}

impl IntoResponse for BeaconRejection {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceKind {
    Wifi,
    Bluetooth,
}

impl DeviceKind {
    fn from_report_type(report_type: &str) -> Option<Self> {
        match report_type {
            "DevicesSeen" => Some(DeviceKind::Wifi),
            "BluetoothDevicesSeen" => Some(DeviceKind::Bluetooth),
            _ => None,
        }
    }
}

/// A beacon report as a JSON object; fields of any other type simply fail their check.
struct BeaconPayload(Map<String, Value>);

impl BeaconPayload {
    fn parse(body: &[u8]) -> Option<Self> {
        match serde_json::from_slice(body).ok()? {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    fn has_data(&self) -> bool {
        self.0.contains_key("data")
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Run the checks in order, stopping at the first failure.
pub fn validate(body: &[u8], config: &LocationConfig) -> Result<DeviceKind, BeaconRejection> {
    let payload = BeaconPayload::parse(body).ok_or(BeaconRejection::InvalidData)?;
    if !payload.has_data() {
        return Err(BeaconRejection::InvalidData);
    }

    if payload.text("secret") != Some(config.secret.as_str()) {
        return Err(BeaconRejection::InvalidSecret);
    }
    debug!("Beacon secret verified");

    if payload.text("version") != Some(config.version.as_str()) {
        return Err(BeaconRejection::InvalidVersion);
    }
    debug!("Beacon version verified: {}", config.version);

    payload
        .text("type")
        .and_then(DeviceKind::from_report_type)
        .ok_or(BeaconRejection::InvalidDeviceType)
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoredLocation {
    Placeholder,
    Received(Bytes),
}

impl IntoResponse for StoredLocation {
    fn into_response(self) -> Response {
        match self {
            StoredLocation::Placeholder => PLACEHOLDER.into_response(),
            StoredLocation::Received(body) => {
                ([(header::CONTENT_TYPE, "application/json")], body).into_response()
            }
        }
    }
}

impl StoredLocation {
    /// Chat-friendly rendering of the slot
    pub fn to_reply(&self) -> String {
        match self {
            StoredLocation::Placeholder => "No location data received yet".to_string(),
            StoredLocation::Received(body) => serde_json::from_slice::<Value>(body)
                .ok()
                .and_then(|v| serde_json::to_string_pretty(&v).ok())
                .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned()),
        }
    }
}

/// Single slot holding the most recent accepted report.
#[derive(Clone)]
pub struct LocationStore {
    latest: Arc<Mutex<StoredLocation>>,
}

impl LocationStore {
    pub fn new() -> Self {
        Self {
            latest: Arc::new(Mutex::new(StoredLocation::Placeholder)),
        }
    }

    pub async fn replace(&self, body: Bytes) {
        *self.latest.lock().await = StoredLocation::Received(body);
    }

    pub async fn latest(&self) -> StoredLocation {
        self.latest.lock().await.clone()
    }
}

pub async fn validator(State(state): State<Arc<AppState>>) -> String {
    info!("Validator requested");
    state.config.location.validator.clone()
}

pub async fn receive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, BeaconRejection> {
    if !has_json_content_type(&headers) {
        warn!("Beacon POST without JSON content type");
        return Err(BeaconRejection::InvalidData);
    }

    let kind = validate(&body, &state.config.location).inspect_err(|rejection| {
        warn!("Beacon POST rejected: {}", rejection);
    })?;

    match kind {
        DeviceKind::Wifi => info!("WiFi devices seen ({} bytes)", body.len()),
        DeviceKind::Bluetooth => info!("Bluetooth devices seen ({} bytes)", body.len()),
    }

    state.location.replace(body).await;
    Ok(ACCEPTED)
}

pub async fn latest(State(state): State<Arc<AppState>>) -> StoredLocation {
    state.location.latest().await
}
