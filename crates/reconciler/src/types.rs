//! Core types for the reconciler.
//!
//! [`Layer`] and [`Plan`] mirror the supervisor's YAML documents. Enums are
//! used internally and only become strings when serialized.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Whether the supervisor starts a service automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Startup {
    #[default]
    Enabled,
    Disabled,
}

/// How a layer's service entry combines with earlier layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Override {
    Merge,
    #[default]
    Replace,
}

/// Desired definition of the one supervised process.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Human-readable summary.
    pub summary: String,
    /// Executable invocation line.
    pub command: String,
    /// Startup policy.
    pub startup: Startup,
    /// Environment variables; empty unless a backend contributes some.
    pub environment: BTreeMap<String, String>,
}

impl ServiceSpec {
    /// Create a spec for the given command line.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Set the summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the startup policy.
    #[must_use]
    pub const fn with_startup(mut self, startup: Startup) -> Self {
        self.startup = startup;
        self
    }

    /// Replace the environment.
    #[must_use]
    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Render the spec as the supervisor's service entry.
    pub fn to_fields(&self) -> ServiceFields {
        ServiceFields {
            override_mode: Some(Override::Replace),
            summary: Some(self.summary.clone()),
            command: Some(self.command.clone()),
            startup: Some(self.startup),
            environment: self.environment.clone(),
        }
    }
}

/// A service entry as the supervisor reports it.
///
/// Every field is optional. Plans may report unset fields as empty values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceFields {
    #[serde(
        rename = "override",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub override_mode: Option<Override>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub startup: Option<Startup>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

impl ServiceFields {
    /// Drop every empty field so that "unset" and "empty" compare equal.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            override_mode: self.override_mode,
            summary: self.summary.clone().filter(|s| !s.is_empty()),
            command: self.command.clone().filter(|s| !s.is_empty()),
            startup: self.startup,
            environment: self.environment.clone(),
        }
    }

    /// Overlay `other` on top of these fields, as a merge override does.
    fn merge(&mut self, other: &Self) {
        if other.override_mode.is_some() {
            self.override_mode = other.override_mode;
        }
        if let Some(summary) = other.summary.as_ref().filter(|s| !s.is_empty()) {
            self.summary = Some(summary.clone());
        }
        if let Some(command) = other.command.as_ref().filter(|s| !s.is_empty()) {
            self.command = Some(command.clone());
        }
        if other.startup.is_some() {
            self.startup = other.startup;
        }
        self.environment.extend(
            other
                .environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }
}

/// A configuration layer submitted to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default)]
    pub services: BTreeMap<String, ServiceFields>,
}

impl Layer {
    /// Create a layer holding one service.
    pub fn single(
        summary: impl Into<String>,
        description: impl Into<String>,
        service: impl Into<String>,
        spec: &ServiceSpec,
    ) -> Self {
        Self {
            summary: summary.into(),
            description: description.into(),
            services: BTreeMap::from([(service.into(), spec.to_fields())]),
        }
    }

    /// Encode the layer as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::encoding(e.to_string()))
    }
}

/// The supervisor's combined view of all layers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub services: BTreeMap<String, ServiceFields>,
}

impl Plan {
    /// Parse a plan from its YAML representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] if the document is not a plan.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| Error::invalid_response(e.to_string()))
    }

    /// Get a service entry.
    pub fn service(&self, name: &str) -> Option<&ServiceFields> {
        self.services.get(name)
    }

    /// Combine a layer into the plan.
    pub fn apply(&mut self, layer: &Layer) {
        for (name, fields) in &layer.services {
            match (fields.override_mode, self.services.get_mut(name)) {
                (Some(Override::Merge), Some(existing)) => existing.merge(fields),
                _ => {
                    self.services.insert(name.clone(), fields.clone());
                }
            }
        }
    }

    /// Check whether the plan defines no services.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Marker recording that a restart was started but not confirmed.
///
/// It is set before the old process is stopped and cleared once the new one
/// has been started, so a pass interrupted in between is finished by the next
/// reconciliation even when the plan itself is already up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PendingRestart {
    #[serde(default)]
    pending: bool,
}

impl PendingRestart {
    /// Record that a restart is in flight.
    pub const fn mark(&mut self) {
        self.pending = true;
    }

    /// Record that the restart completed.
    pub const fn clear(&mut self) {
        self.pending = false;
    }

    /// Check whether a restart is still in flight.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        self.pending
    }
}

/// Actions the reconciler can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Running definition already matches.
    None,
    /// Submit the spec and restart the service.
    Replace { spec: ServiceSpec },
}

impl ReconcileAction {
    /// Check whether this action replaces the running definition.
    #[must_use]
    pub const fn is_replace(&self) -> bool {
        matches!(self, Self::Replace { .. })
    }

    /// Get a description of the action.
    pub fn description(&self) -> String {
        match self {
            Self::None => "no change".to_string(),
            Self::Replace { spec } if spec.environment.is_empty() => {
                format!("replace service: {}", spec.command)
            }
            Self::Replace { spec } => format!(
                "replace service: {} (env: {})",
                spec.command,
                spec.environment.keys().join(", ")
            ),
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Action that was realised.
    pub action: ReconcileAction,
    /// Whether the service was (re)started during this pass.
    pub started: bool,
}

impl ReconcileResult {
    /// Create a new reconcile result.
    pub const fn new(action: ReconcileAction, started: bool) -> Self {
        Self { action, started }
    }

    /// Check whether the pass touched nothing.
    #[must_use]
    pub const fn converged(&self) -> bool {
        !self.action.is_replace() && !self.started
    }
}

fn blank_as_none<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) if s.is_empty() => Ok(None),
        Some(value) => T::deserialize(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
