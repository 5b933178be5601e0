//! Workload context assembled fresh for every reconciliation pass.

use std::collections::BTreeMap;

use mlflow_core::OperatorConfig;
use mlflow_reconciler::{ServiceSpec, Startup};

use crate::relations::RelationSnapshot;

/// Backend store used without a database relation.
pub const DEFAULT_BACKEND_STORE_URI: &str = "sqlite:///mlflow.db";

/// Artifact root used without an object-storage relation.
pub const DEFAULT_ARTIFACT_ROOT: &str = "./mlruns";

/// Summary of the tracking server service.
pub const SERVICE_SUMMARY: &str = "MLflow server";

/// Everything the desired service definition is derived from.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadContext<'a> {
    config: &'a OperatorConfig,
    relations: &'a RelationSnapshot,
}

impl<'a> WorkloadContext<'a> {
    pub const fn new(config: &'a OperatorConfig, relations: &'a RelationSnapshot) -> Self {
        Self { config, relations }
    }

    pub fn backend_store_uri(&self) -> String {
        self.relations
            .database
            .as_ref()
            .map_or_else(|| DEFAULT_BACKEND_STORE_URI.to_string(), |db| db.uri())
    }

    pub fn artifact_root(&self) -> String {
        self.relations
            .object_storage
            .as_ref()
            .map_or_else(|| DEFAULT_ARTIFACT_ROOT.to_string(), |store| store.artifact_root())
    }

    pub fn environment(&self) -> BTreeMap<String, String> {
        self.relations
            .object_storage
            .as_ref()
            .map(|store| store.environment())
            .unwrap_or_default()
    }

    /// Shell invocation of the tracking server.
    ///
    /// Exit code 2 marks a server that could not start.
    pub fn command(&self) -> String {
        format!(
            "/bin/sh -c \"mlflow server --host {} --port {} --backend-store-uri {} --default-artifact-root {} || exit 2\"",
            self.config.host,
            self.config.port,
            self.backend_store_uri(),
            self.artifact_root()
        )
    }

    /// The desired definition of the tracking server.
    pub fn service_spec(&self) -> ServiceSpec {
        ServiceSpec::new(self.command())
            .with_summary(SERVICE_SUMMARY)
            .with_startup(Startup::Enabled)
            .with_environment(self.environment())
    }
}
