//! Unit status reported to the host.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of the unit.
///
/// Serialized as `{"name": "...", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "message", rename_all = "lowercase")]
pub enum UnitStatus {
    /// Preconditions not met; resolved by new data arriving.
    Waiting(String),
    /// Reconciliation in progress.
    Maintenance(String),
    /// Needs attention: supervisor unreachable or server not running.
    Blocked(String),
    /// Desired definition applied and the server is running.
    Active,
}

impl UnitStatus {
    pub fn waiting(message: impl Into<String>) -> Self {
        Self::Waiting(message.into())
    }

    pub fn maintenance(message: impl Into<String>) -> Self {
        Self::Maintenance(message.into())
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::Blocked(message.into())
    }

    /// Status name as the host spells it.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Waiting(_) => "waiting",
            Self::Maintenance(_) => "maintenance",
            Self::Blocked(_) => "blocked",
            Self::Active => "active",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Waiting(message) | Self::Maintenance(message) | Self::Blocked(message) => {
                message
            }
            Self::Active => "",
        }
    }

    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl Default for UnitStatus {
    fn default() -> Self {
        Self::waiting(crate::operator::PLAN_PENDING)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            other => write!(f, "{}: {}", other.name(), other.message()),
        }
    }
}
