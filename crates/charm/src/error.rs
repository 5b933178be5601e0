//! Error types for event handling.

use thiserror::Error;

/// Result type for operator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while handling operator events.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is absent from relation data.
    #[error("{relation} relation data is missing '{field}'")]
    RelationDataMissing { relation: String, field: String },

    /// Relation data is present but malformed.
    #[error("invalid {relation} relation data: {reason}")]
    RelationDataInvalid { relation: String, reason: String },

    /// The artifact bucket could not be checked or created.
    #[error("bucket '{bucket}' unavailable: {reason}")]
    BucketUnavailable { bucket: String, reason: String },

    /// Local state could not be read or written.
    #[error("state error: {0}")]
    State(#[from] mlflow_core::Error),
}

impl Error {
    /// Create a missing relation field error.
    pub fn relation_data_missing(relation: impl Into<String>, field: impl Into<String>) -> Self {
        Self::RelationDataMissing {
            relation: relation.into(),
            field: field.into(),
        }
    }

    /// Create an invalid relation data error.
    pub fn relation_data_invalid(relation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RelationDataInvalid {
            relation: relation.into(),
            reason: reason.into(),
        }
    }

    /// Create a bucket provisioning error.
    pub fn bucket_unavailable(bucket: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BucketUnavailable {
            bucket: bucket.into(),
            reason: reason.into(),
        }
    }
}
