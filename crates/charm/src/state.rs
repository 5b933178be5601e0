//! State carried between event deliveries.

use std::path::PathBuf;

use mlflow_core::Error as CoreError;
use mlflow_reconciler::PendingRestart;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::event::OperatorEvent;
use crate::relations::RelationSnapshot;
use crate::status::UnitStatus;

/// Everything the operator remembers between events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorState {
    #[serde(default)]
    pub relations: RelationSnapshot,

    #[serde(default)]
    pub pending_restart: PendingRestart,

    /// Events waiting for re-delivery, oldest first.
    #[serde(default)]
    pub deferred: Vec<OperatorEvent>,

    #[serde(default)]
    pub status: UnitStatus,
}

/// JSON file holding an [`OperatorState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the state; a missing file yields the initial state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<OperatorState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No state file, starting fresh");
            return Ok(OperatorState::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| CoreError::file_read_failed(&self.path, e.to_string()))?;
        let state: OperatorState = serde_json::from_str(&content)
            .map_err(|e| CoreError::json_parse_failed(e.to_string()))?;
        Ok(state)
    }

    /// Persist the state.
    ///
    /// The file is written next to its destination and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be encoded or written.
    pub fn save(&self, state: &OperatorState) -> Result<()> {
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| CoreError::json_parse_failed(e.to_string()))?;

        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, content)
            .map_err(|e| CoreError::file_write_failed(&staging, e.to_string()))?;
        std::fs::rename(&staging, &self.path)
            .map_err(|e| CoreError::file_write_failed(&self.path, e.to_string()))?;

        debug!(path = %self.path.display(), deferred = state.deferred.len(), "State saved");
        Ok(())
    }
}
