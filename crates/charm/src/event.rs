//! Events delivered by the host and the reports produced for them.

use std::collections::BTreeMap;

use mlflow_core::{OperatorConfig, Port};
use serde::{Deserialize, Serialize};

use crate::status::UnitStatus;

/// An event delivered to the operator.
///
/// Encoded as `{"kind": "mysql-relation-changed", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OperatorEvent {
    Install,
    ServerPebbleReady,
    ConfigChanged,
    MysqlRelationChanged {
        /// Remote unit data.
        #[serde(default)]
        data: BTreeMap<String, String>,
    },
    MysqlRelationBroken,
    ObjectStorageRelationChanged {
        /// Remote application data.
        #[serde(default)]
        data: BTreeMap<String, String>,
    },
    ObjectStorageRelationBroken,
    DbUpgradeAction {
        #[serde(default)]
        params: DbUpgradeParams,
    },
}

impl OperatorEvent {
    /// Event name as the host spells it.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::ServerPebbleReady => "server-pebble-ready",
            Self::ConfigChanged => "config-changed",
            Self::MysqlRelationChanged { .. } => "mysql-relation-changed",
            Self::MysqlRelationBroken => "mysql-relation-broken",
            Self::ObjectStorageRelationChanged { .. } => "object-storage-relation-changed",
            Self::ObjectStorageRelationBroken => "object-storage-relation-broken",
            Self::DbUpgradeAction { .. } => "db-upgrade-action",
        }
    }

    /// Whether the event carries relation data.
    pub const fn is_relation_event(&self) -> bool {
        matches!(
            self,
            Self::MysqlRelationChanged { .. }
                | Self::MysqlRelationBroken
                | Self::ObjectStorageRelationChanged { .. }
                | Self::ObjectStorageRelationBroken
        )
    }
}

/// Parameters of the `db-upgrade` action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbUpgradeParams {
    #[serde(rename = "i-really-mean-it", default)]
    pub confirmed: bool,
}

/// Facts about the hook invocation that are not part of the event.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    pub config: OperatorConfig,
    pub is_leader: bool,
}

impl HookContext {
    pub const fn new(config: OperatorConfig, is_leader: bool) -> Self {
        Self { config, is_leader }
    }
}

/// Request published on the ingress relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IngressRequest {
    pub service_hostname: String,
    pub service_name: String,
    pub service_port: Port,
}

/// Result of an operator-invoked action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ActionOutcome {
    Completed { results: BTreeMap<String, String> },
    Failed { message: String },
}

impl ActionOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventReport {
    /// Name of the handled event.
    pub event: String,

    /// Status after handling.
    pub status: UnitStatus,

    /// Every status set while handling, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<UnitStatus>,

    /// Whether the event was re-queued for later delivery.
    #[serde(default)]
    pub deferred: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressRequest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionOutcome>,
}
