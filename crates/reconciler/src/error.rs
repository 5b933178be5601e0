//! Error types for the reconciler crate.

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler and supervisor error types.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The supervisor could not be reached.
    #[error("supervisor connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// The supervisor did not answer in time.
    #[error("supervisor request timed out: {reason}")]
    Timeout { reason: String },

    /// The supervisor rejected a request.
    #[error("supervisor API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A start or stop finished, but the service did not come up or go down.
    #[error("service change failed: {reason}")]
    ServiceFailed { reason: String },

    /// The supervisor answered with something we cannot interpret.
    #[error("invalid supervisor response: {reason}")]
    InvalidResponse { reason: String },

    /// A layer could not be encoded for submission.
    #[error("failed to encode layer: {reason}")]
    Encoding { reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create a connection failed error.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(reason: impl Into<String>) -> Self {
        Self::Timeout {
            reason: reason.into(),
        }
    }

    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a service failure error.
    pub fn service_failed(reason: impl Into<String>) -> Self {
        Self::ServiceFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Create an encoding error.
    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::Encoding {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether the failure is a transient supervisor problem worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::Api { .. }
        )
    }

    /// Whether the supervisor was reachable but the service itself failed.
    #[must_use]
    pub const fn is_service_failure(&self) -> bool {
        matches!(self, Self::ServiceFailed { .. })
    }
}
