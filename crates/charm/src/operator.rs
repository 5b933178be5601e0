//! Event handlers of the tracking server operator.
//!
//! Every handler ends in exactly one of three places:
//!
//! - **Waiting**: relation data is incomplete, nothing is reconciled
//! - **Blocked**: the supervisor failed, the server is not running or the
//!   artifact bucket is unavailable; the event is usually deferred
//! - **Active**: the desired definition is applied and the server runs
//!
//! Status changes are logged and recorded in the [`EventReport`].

use std::collections::BTreeMap;
use std::sync::Arc;

use mlflow_core::OperatorConfig;
use mlflow_reconciler::{Reconciler, ServiceSpec};
use tracing::{debug, info, warn};

use crate::buckets::{BucketProvisioner, S3BucketProvisioner};
use crate::context::WorkloadContext;
use crate::event::{
    ActionOutcome, DbUpgradeParams, EventReport, HookContext, IngressRequest, OperatorEvent,
};
use crate::relations::{ARTIFACT_BUCKET, DatabaseRelation, ObjectStorageRelation};
use crate::state::OperatorState;
use crate::status::UnitStatus;

/// Application name used in ingress requests unless configured otherwise.
pub const DEFAULT_APP_NAME: &str = "mlflow-server";

pub const PLAN_PENDING: &str = "Waiting for the Pebble plan to be created.";
pub const DATABASE_DATA_MISSING: &str = "MySQL data are missing.";
pub const OBJECT_STORAGE_DATA_MISSING: &str = "Minio data are missing.";
pub const BUCKET_UNAVAILABLE: &str = "Minio bucket could not be created.";
pub const SUPERVISOR_UNREACHABLE: &str = "Pebble API connection problem.";
pub const SERVER_NOT_RUNNING: &str = "MLflow server is not running.";
pub const SERVER_MAINTENANCE: &str = "MLflow server maintenance";
pub const DB_UPGRADE_RUNNING: &str = "Running MLflow db upgrade";
pub const DB_UPGRADE_DONE: &str = "MLflow database was upgraded";
pub const DB_UPGRADE_RESTART_FAILED: &str = "MLflow server does not start after a restart.";
pub const CONFIRMATION_REQUIRED: &str =
    "The 'i-really-mean-it' parameter must be toggled to enable actually performing this action.";

#[derive(Debug, Default)]
struct Outcome {
    deferred: bool,
    ingress: Option<IngressRequest>,
    action: Option<ActionOutcome>,
}

impl Outcome {
    fn done() -> Self {
        Self::default()
    }

    fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }

    fn action(outcome: ActionOutcome) -> Self {
        Self {
            action: Some(outcome),
            ..Self::default()
        }
    }
}

/// The operator: owns the reconciler and the state carried between events.
pub struct Operator {
    reconciler: Reconciler,
    buckets: Arc<dyn BucketProvisioner>,
    app_name: String,
    state: OperatorState,
    transitions: Vec<UnitStatus>,
}

impl Operator {
    /// Create an operator resuming from `state`.
    ///
    /// Buckets are provisioned over the S3 API unless another provisioner is
    /// set with [`Operator::with_bucket_provisioner`].
    pub fn new(reconciler: Reconciler, state: OperatorState) -> Self {
        Self {
            reconciler,
            buckets: Arc::new(S3BucketProvisioner::new()),
            app_name: DEFAULT_APP_NAME.to_string(),
            state,
            transitions: Vec::new(),
        }
    }

    /// Set the application name published in ingress requests.
    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    #[must_use]
    pub fn with_bucket_provisioner(mut self, buckets: Arc<dyn BucketProvisioner>) -> Self {
        self.buckets = buckets;
        self
    }

    pub fn state(&self) -> &OperatorState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut OperatorState {
        &mut self.state
    }

    pub fn into_state(self) -> OperatorState {
        self.state
    }

    /// The service definition the current config and relations call for.
    pub fn desired_spec(&self, config: &OperatorConfig) -> ServiceSpec {
        WorkloadContext::new(config, &self.state.relations).service_spec()
    }

    /// The ingress request matching `config`.
    pub fn ingress_request(&self, config: &OperatorConfig) -> IngressRequest {
        IngressRequest {
            service_hostname: config.host.clone(),
            service_name: self.app_name.clone(),
            service_port: config.port,
        }
    }

    /// Handle one event to completion.
    pub async fn handle(&mut self, event: &OperatorEvent, hook: &HookContext) -> EventReport {
        self.transitions.clear();
        info!(event = event.name(), leader = hook.is_leader, "Handling event");

        let outcome = match event {
            OperatorEvent::Install => self.on_install(),
            OperatorEvent::ServerPebbleReady => self.reconcile_workload(&hook.config).await,
            OperatorEvent::ConfigChanged => self.on_config_changed(&hook.config).await,
            _ if event.is_relation_event() && !hook.is_leader => {
                debug!(event = event.name(), "Not the leader, ignoring");
                Outcome::done()
            }
            OperatorEvent::MysqlRelationChanged { data } => {
                self.on_database_changed(data, &hook.config).await
            }
            OperatorEvent::MysqlRelationBroken => {
                self.state.relations.database = None;
                self.reconcile_workload(&hook.config).await
            }
            OperatorEvent::ObjectStorageRelationChanged { data } => {
                self.on_object_storage_changed(data, &hook.config).await
            }
            OperatorEvent::ObjectStorageRelationBroken => {
                self.state.relations.object_storage = None;
                self.reconcile_workload(&hook.config).await
            }
            OperatorEvent::DbUpgradeAction { params } => self.on_db_upgrade(*params).await,
        };

        if outcome.deferred {
            info!(event = event.name(), "Deferring event");
        }

        EventReport {
            event: event.name().to_string(),
            status: self.state.status.clone(),
            transitions: std::mem::take(&mut self.transitions),
            deferred: outcome.deferred,
            ingress: outcome.ingress,
            action: outcome.action,
        }
    }

    fn on_install(&mut self) -> Outcome {
        self.set_status(UnitStatus::waiting(PLAN_PENDING));
        Outcome::done()
    }

    async fn on_config_changed(&mut self, config: &OperatorConfig) -> Outcome {
        let mut outcome = self.reconcile_workload(config).await;
        if self.state.status.is_active() {
            outcome.ingress = Some(self.ingress_request(config));
        }
        outcome
    }

    async fn on_database_changed(
        &mut self,
        data: &BTreeMap<String, String>,
        config: &OperatorConfig,
    ) -> Outcome {
        match DatabaseRelation::from_unit_data(data) {
            Ok(database) => {
                self.state.relations.database = Some(database);
                self.reconcile_workload(config).await
            }
            Err(e) => {
                info!(error = %e, "Database relation incomplete");
                self.set_status(UnitStatus::waiting(DATABASE_DATA_MISSING));
                Outcome::done()
            }
        }
    }

    async fn on_object_storage_changed(
        &mut self,
        data: &BTreeMap<String, String>,
        config: &OperatorConfig,
    ) -> Outcome {
        match ObjectStorageRelation::from_app_data(data) {
            Ok(store) => {
                debug!(endpoint = %store.endpoint(), "Object storage relation ready");
                if let Err(e) = self.buckets.ensure_bucket(&store, ARTIFACT_BUCKET).await {
                    warn!(error = %e, "Artifact bucket unavailable");
                    self.set_status(UnitStatus::blocked(BUCKET_UNAVAILABLE));
                    return Outcome::deferred();
                }
                self.state.relations.object_storage = Some(store);
                self.reconcile_workload(config).await
            }
            Err(e) => {
                info!(error = %e, "Object storage relation incomplete");
                self.set_status(UnitStatus::waiting(OBJECT_STORAGE_DATA_MISSING));
                Outcome::done()
            }
        }
    }

    async fn reconcile_workload(&mut self, config: &OperatorConfig) -> Outcome {
        let desired = self.desired_spec(config);

        match self.converge(&desired).await {
            Ok(true) => {
                self.set_status(UnitStatus::Active);
                Outcome::done()
            }
            Ok(false) => {
                warn!("Server is not running after reconciliation");
                self.set_status(UnitStatus::blocked(SERVER_NOT_RUNNING));
                Outcome::deferred()
            }
            Err(e) if e.is_service_failure() => {
                warn!(error = %e, "Server failed to start");
                self.set_status(UnitStatus::blocked(SERVER_NOT_RUNNING));
                Outcome::deferred()
            }
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "Reconciliation failed");
                self.set_status(UnitStatus::blocked(SUPERVISOR_UNREACHABLE));
                if e.is_transient() {
                    Outcome::deferred()
                } else {
                    Outcome::done()
                }
            }
        }
    }

    /// Apply `desired` and report whether the server runs afterwards.
    async fn converge(&mut self, desired: &ServiceSpec) -> mlflow_reconciler::Result<bool> {
        let action = self.reconciler.compute_action(desired).await?;
        if action.is_replace() {
            self.set_status(UnitStatus::maintenance(SERVER_MAINTENANCE));
        }

        let result = self
            .reconciler
            .apply(action, &mut self.state.pending_restart)
            .await?;
        debug!(
            started = result.started,
            converged = result.converged(),
            "Reconciliation applied"
        );

        self.reconciler.is_running().await
    }

    async fn on_db_upgrade(&mut self, params: DbUpgradeParams) -> Outcome {
        if !params.confirmed {
            return Outcome::action(ActionOutcome::failed(CONFIRMATION_REQUIRED));
        }

        match self.reconciler.is_running().await {
            Ok(true) => {}
            Ok(false) => return Outcome::action(ActionOutcome::failed(SERVER_NOT_RUNNING)),
            Err(e) => {
                warn!(error = %e, "Cannot check server before db upgrade");
                self.set_status(UnitStatus::blocked(SUPERVISOR_UNREACHABLE));
                return Outcome::action(ActionOutcome::failed(format!(
                    "{SUPERVISOR_UNREACHABLE} {e}"
                )));
            }
        }

        self.set_status(UnitStatus::maintenance(DB_UPGRADE_RUNNING));
        info!("Running MLflow db upgrade");

        match self.reconciler.restart().await {
            Ok(true) => {
                self.set_status(UnitStatus::Active);
                Outcome::action(ActionOutcome::Completed {
                    results: BTreeMap::from([("result".to_string(), DB_UPGRADE_DONE.to_string())]),
                })
            }
            Ok(false) => {
                self.set_status(UnitStatus::blocked(SERVER_NOT_RUNNING));
                Outcome::action(ActionOutcome::failed(DB_UPGRADE_RESTART_FAILED))
            }
            Err(e) if e.is_service_failure() => {
                warn!(error = %e, "Server failed to start after db upgrade");
                self.set_status(UnitStatus::blocked(SERVER_NOT_RUNNING));
                Outcome::action(ActionOutcome::failed(DB_UPGRADE_RESTART_FAILED))
            }
            Err(e) => {
                warn!(error = %e, "Restart during db upgrade failed");
                self.set_status(UnitStatus::blocked(SUPERVISOR_UNREACHABLE));
                Outcome::action(ActionOutcome::failed(format!(
                    "{SUPERVISOR_UNREACHABLE} {e}"
                )))
            }
        }
    }

    fn set_status(&mut self, status: UnitStatus) {
        info!(%status, "Unit status");
        self.transitions.push(status.clone());
        self.state.status = status;
    }
}
