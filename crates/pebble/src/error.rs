//! Error types for the Pebble client.

use thiserror::Error;

/// Result type for Pebble operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to Pebble.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to connect to Pebble.
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// Request to Pebble timed out.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Pebble answered with an error envelope.
    #[error("pebble API error {status}: {message}")]
    Api { status: u16, message: String },

    /// A change finished with an error.
    #[error("change {id} failed: {reason}")]
    ChangeFailed { id: String, reason: String },

    /// Invalid response from Pebble.
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// Configuration error.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Layer encoding or plan decoding error.
    #[error("plan error: {0}")]
    Plan(#[from] mlflow_reconciler::Error),
}

impl Error {
    /// Create a connection failed error.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub const fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a change failed error.
    pub fn change_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ChangeFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Create a config error.
    pub fn config_error(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }

    /// Classify a transport error from reqwest.
    pub fn from_request(error: reqwest::Error, timeout_ms: u64) -> Self {
        if error.is_timeout() {
            Self::timeout(timeout_ms)
        } else if error.is_connect() {
            Self::connection_failed(error.to_string())
        } else {
            Self::Http(error)
        }
    }
}

impl From<Error> for mlflow_reconciler::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::ConnectionFailed { reason } => Self::connection_failed(reason),
            Error::Http(e) => Self::connection_failed(e.to_string()),
            Error::Timeout { timeout_ms } => Self::timeout(format!("{timeout_ms}ms")),
            Error::Api { status, message } => Self::api(status, message),
            Error::ChangeFailed { id, reason } => {
                Self::service_failed(format!("change {id}: {reason}"))
            }
            Error::InvalidResponse { reason } => Self::invalid_response(reason),
            Error::Json(e) => Self::invalid_response(e.to_string()),
            Error::ConfigError { reason } => Self::invalid_config(reason),
            Error::UrlParse(e) => Self::invalid_config(e.to_string()),
            Error::Plan(e) => e,
        }
    }
}
