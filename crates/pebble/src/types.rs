//! Wire types of the Pebble v1 API.

use serde::{Deserialize, Serialize};

/// Kind of response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Sync,
    Async,
    Error,
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: ResponseType,

    #[serde(rename = "status-code", default)]
    pub status_code: u16,

    #[serde(default)]
    pub result: serde_json::Value,

    /// Change id for asynchronous operations.
    #[serde(default)]
    pub change: Option<String>,
}

impl Envelope {
    /// Message carried by an error envelope.
    pub fn error_message(&self) -> String {
        self.result
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| self.result.to_string(), ToString::to_string)
    }
}

/// A change as reported by `/v1/changes/{id}/wait`.
#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    pub id: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub err: Option<String>,
}

/// Service lifecycle verb for `POST /v1/services`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
}

impl std::fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// Current state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Active,
    Inactive,
    Backoff,
    Error,
    #[serde(other)]
    Unknown,
}

/// Entry of `GET /v1/services`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInfo {
    pub name: String,

    #[serde(default)]
    pub startup: String,

    pub current: ServiceStatus,
}

impl ServiceInfo {
    /// Whether the service is running.
    pub fn is_running(&self) -> bool {
        self.current == ServiceStatus::Active
    }
}
