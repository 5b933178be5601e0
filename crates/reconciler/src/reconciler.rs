//! Reconciler implementation.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::supervisor::Supervisor;
use crate::types::{Layer, PendingRestart, ReconcileAction, ReconcileResult, ServiceFields, ServiceSpec};

/// Configuration for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Name of the managed service inside the plan.
    pub service_name: String,
    /// Label of the layer carrying the service definition.
    pub layer_label: String,
    /// Summary written into the layer.
    pub layer_summary: String,
    /// Description written into the layer.
    pub layer_description: String,
    /// Whether layers combine with an existing layer of the same label.
    pub combine: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            service_name: "server".to_string(),
            layer_label: "mlflow-server".to_string(),
            layer_summary: "MLflow server layer".to_string(),
            layer_description: "pebble config layer for MLflow server".to_string(),
            combine: true,
        }
    }
}

/// Compare the desired spec against the running service entry.
///
/// Both sides are normalized first, so fields reported as empty by the
/// supervisor compare equal to fields the desired spec leaves out.
pub fn diff(desired: &ServiceSpec, running: Option<&ServiceFields>) -> ReconcileAction {
    let wanted = desired.to_fields().normalized();

    match running.map(ServiceFields::normalized) {
        Some(current) if current == wanted => ReconcileAction::None,
        _ => ReconcileAction::Replace {
            spec: desired.clone(),
        },
    }
}

/// Reconciler for the supervised tracking server.
pub struct Reconciler {
    /// Process supervisor.
    supervisor: Arc<dyn Supervisor>,
    /// Configuration.
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(supervisor: Arc<dyn Supervisor>, config: ReconcilerConfig) -> Self {
        Self { supervisor, config }
    }

    /// Bring the running service in line with `desired`.
    ///
    /// Equivalent to [`Reconciler::compute_action`] followed by [`Reconciler::apply`].
    ///
    /// # Errors
    ///
    /// Returns the supervisor error of the first failing call.
    pub async fn reconcile(
        &self,
        desired: &ServiceSpec,
        pending: &mut PendingRestart,
    ) -> Result<ReconcileResult> {
        let action = self.compute_action(desired).await?;
        self.apply(action, pending).await
    }

    /// Diff `desired` against the supervisor's current plan.
    ///
    /// Only the managed service's entry is compared; other services in the
    /// plan are left alone.
    ///
    /// # Errors
    ///
    /// Returns the supervisor error if the plan cannot be fetched.
    pub async fn compute_action(&self, desired: &ServiceSpec) -> Result<ReconcileAction> {
        let service = self.config.service_name.as_str();
        let plan = self.supervisor.get_plan().await?;
        let action = diff(desired, plan.service(service));

        debug!(service, action = %action.description(), "Computed diff");
        Ok(action)
    }

    /// Realise an action.
    ///
    /// A replacement adds the layer, stops the service if it is running, and
    /// starts it again. `pending` is marked across the stop/start window; a
    /// later pass that finds no diff but a pending marker starts the service
    /// if it is not running.
    ///
    /// # Errors
    ///
    /// Returns the supervisor error of the first failing call.
    pub async fn apply(
        &self,
        action: ReconcileAction,
        pending: &mut PendingRestart,
    ) -> Result<ReconcileResult> {
        let service = self.config.service_name.as_str();

        match action {
            ReconcileAction::None if pending.is_pending() => {
                warn!(service, "Resuming interrupted restart");
                let started = self.ensure_started().await?;
                pending.clear();
                Ok(ReconcileResult::new(ReconcileAction::None, started))
            }
            ReconcileAction::None => {
                debug!(service, "Service definition unchanged");
                Ok(ReconcileResult::new(ReconcileAction::None, false))
            }
            ReconcileAction::Replace { spec } => {
                let layer = self.layer_for(&spec);
                self.supervisor
                    .add_layer(&self.config.layer_label, &layer, self.config.combine)
                    .await?;

                pending.mark();
                if self.supervisor.is_running(service).await? {
                    info!(service, "Restarting service");
                    self.supervisor.stop_service(service).await?;
                }
                self.supervisor.start_service(service).await?;
                pending.clear();

                info!(service, "Service definition replaced");
                Ok(ReconcileResult::new(ReconcileAction::Replace { spec }, true))
            }
        }
    }

    /// Stop and start the service regardless of its definition.
    ///
    /// Returns whether the service is running afterwards.
    ///
    /// # Errors
    ///
    /// Returns the supervisor error of the first failing call.
    pub async fn restart(&self) -> Result<bool> {
        let service = self.config.service_name.as_str();
        info!(service, "Restarting service");
        self.supervisor.stop_service(service).await?;
        self.supervisor.start_service(service).await?;
        self.supervisor.is_running(service).await
    }

    /// Check whether the managed service is running.
    ///
    /// # Errors
    ///
    /// Returns the supervisor error if the check fails.
    pub async fn is_running(&self) -> Result<bool> {
        self.supervisor.is_running(&self.config.service_name).await
    }

    /// Wrap a spec into the layer submitted to the supervisor.
    pub fn layer_for(&self, spec: &ServiceSpec) -> Layer {
        Layer::single(
            self.config.layer_summary.as_str(),
            self.config.layer_description.as_str(),
            self.config.service_name.as_str(),
            spec,
        )
    }

    async fn ensure_started(&self) -> Result<bool> {
        let service = self.config.service_name.as_str();
        if self.supervisor.is_running(service).await? {
            return Ok(false);
        }
        self.supervisor.start_service(service).await?;
        Ok(true)
    }

    /// Get the supervisor.
    pub fn supervisor(&self) -> &Arc<dyn Supervisor> {
        &self.supervisor
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    supervisor: Option<Arc<dyn Supervisor>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            supervisor: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the supervisor.
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: Arc<dyn Supervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the managed service name.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.service_name = name.into();
        self
    }

    /// Set the layer label.
    #[must_use]
    pub fn layer_label(mut self, label: impl Into<String>) -> Self {
        self.config.layer_label = label.into();
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] without a supervisor or with blank names.
    pub fn build(self) -> Result<Reconciler> {
        let supervisor = self
            .supervisor
            .ok_or_else(|| Error::invalid_config("Supervisor is required"))?;

        if self.config.service_name.trim().is_empty() {
            return Err(Error::invalid_config("Service name must not be empty"));
        }
        if self.config.layer_label.trim().is_empty() {
            return Err(Error::invalid_config("Layer label must not be empty"));
        }

        Ok(Reconciler::new(supervisor, self.config))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
