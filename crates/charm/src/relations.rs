//! Relation payloads contributed by the database and object-storage peers.

use std::collections::BTreeMap;

use mlflow_core::Port;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the database relation.
pub const DATABASE_RELATION: &str = "mysql";

/// Name of the object-storage relation.
pub const OBJECT_STORAGE_RELATION: &str = "object-storage";

/// Bucket holding the tracking server's artifacts.
pub const ARTIFACT_BUCKET: &str = "mlflow";

/// Connection details published by the database peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRelation {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: String,
    pub database: String,
}

impl DatabaseRelation {
    /// Read the remote unit's relation data.
    ///
    /// All of `user`, `password`, `host`, `port` and `database` must be present
    /// and non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RelationDataMissing`] naming the first absent field.
    pub fn from_unit_data(data: &BTreeMap<String, String>) -> Result<Self> {
        let field = |name: &str| {
            data.get(name)
                .filter(|value| !value.trim().is_empty())
                .cloned()
                .ok_or_else(|| Error::relation_data_missing(DATABASE_RELATION, name))
        };

        Ok(Self {
            user: field("user")?,
            password: field("password")?,
            host: field("host")?,
            port: field("port")?,
            database: field("database")?,
        })
    }

    /// Backend store URI for the tracking server.
    pub fn uri(&self) -> String {
        format!(
            "mysql+pymysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// Whether the object store's TLS certificate is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsVerification {
    Verify,
    Skip,
}

impl TlsVerification {
    /// Map the peer's `secure` flag.
    pub const fn from_secure(secure: bool) -> Self {
        if secure { Self::Verify } else { Self::Skip }
    }

    /// Value of `MLFLOW_S3_IGNORE_TLS`.
    pub const fn ignore_tls(self) -> &'static str {
        match self {
            Self::Verify => "false",
            Self::Skip => "true",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObjectStoragePayload {
    service: Option<String>,
    port: Option<Port>,
    #[serde(rename = "access-key")]
    access_key: Option<String>,
    #[serde(rename = "secret-key")]
    secret_key: Option<String>,
    secure: Option<bool>,
}

/// Endpoint and credentials published by the object-storage peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStorageRelation {
    pub service: String,
    pub port: Port,
    pub access_key: String,
    pub secret_key: String,
    pub tls: TlsVerification,
}

impl ObjectStorageRelation {
    /// Read the remote application's relation data.
    ///
    /// The payload is a YAML document stored under the `data` key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RelationDataMissing`] when a field is absent and
    /// [`Error::RelationDataInvalid`] when the document does not parse.
    pub fn from_app_data(data: &BTreeMap<String, String>) -> Result<Self> {
        let missing = |field: &str| Error::relation_data_missing(OBJECT_STORAGE_RELATION, field);

        let document = data.get("data").map_or("{}", String::as_str);
        let payload: ObjectStoragePayload = serde_yaml::from_str(document)
            .map_err(|e| Error::relation_data_invalid(OBJECT_STORAGE_RELATION, e.to_string()))?;

        Ok(Self {
            service: payload
                .service
                .filter(|s| !s.is_empty())
                .ok_or_else(|| missing("service"))?,
            port: payload.port.ok_or_else(|| missing("port"))?,
            access_key: payload.access_key.ok_or_else(|| missing("access-key"))?,
            secret_key: payload.secret_key.ok_or_else(|| missing("secret-key"))?,
            tls: payload
                .secure
                .map(TlsVerification::from_secure)
                .ok_or_else(|| missing("secure"))?,
        })
    }

    /// `service:port` of the object store.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.service, self.port)
    }

    /// Environment the tracking server needs to reach the store.
    ///
    /// The endpoint URL is always `http://`; TLS handling is expressed through
    /// `MLFLOW_S3_IGNORE_TLS`.
    pub fn environment(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                "MLFLOW_S3_ENDPOINT_URL".to_string(),
                format!("http://{}", self.endpoint()),
            ),
            ("AWS_ACCESS_KEY_ID".to_string(), self.access_key.clone()),
            ("AWS_SECRET_ACCESS_KEY".to_string(), self.secret_key.clone()),
            (
                "MLFLOW_S3_IGNORE_TLS".to_string(),
                self.tls.ignore_tls().to_string(),
            ),
        ])
    }

    /// Artifact root inside the store.
    pub fn artifact_root(&self) -> String {
        format!("s3://{ARTIFACT_BUCKET}/")
    }
}

/// The relation data currently contributing to the workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSnapshot {
    #[serde(default)]
    pub database: Option<DatabaseRelation>,

    #[serde(default)]
    pub object_storage: Option<ObjectStorageRelation>,
}
