//! The process supervisor seam.
//!
//! [`Supervisor`] is the narrow interface the reconciler needs from the
//! container's process manager. [`InMemorySupervisor`] is an in-process
//! implementation with the same layer-combining rules, used for dry runs and
//! tests.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Layer, Plan};

/// Operations the reconciler performs against the process supervisor.
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Fetch the current combined plan.
    async fn get_plan(&self) -> Result<Plan>;

    /// Add a layer, combining it with an existing layer of the same label when `combine` is set.
    async fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<()>;

    /// Start a service.
    async fn start_service(&self, name: &str) -> Result<()>;

    /// Stop a service.
    async fn stop_service(&self, name: &str) -> Result<()>;

    /// Check whether a service is currently running.
    async fn is_running(&self, name: &str) -> Result<bool>;
}

#[derive(Debug, Default)]
struct Inner {
    layers: BTreeMap<String, Layer>,
    order: Vec<String>,
    running: BTreeSet<String>,
    starts: BTreeMap<String, usize>,
    stops: BTreeMap<String, usize>,
    unreachable: bool,
    crash_on_start: BTreeSet<String>,
    reject_start: BTreeSet<String>,
}

impl Inner {
    fn plan(&self) -> Plan {
        let mut plan = Plan::default();
        self.order
            .iter()
            .filter_map(|label| self.layers.get(label))
            .for_each(|layer| plan.apply(layer));
        plan
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(Error::connection_failed("supervisor socket unavailable"));
        }
        Ok(())
    }
}

/// In-memory supervisor.
#[derive(Debug, Default)]
pub struct InMemorySupervisor {
    inner: Mutex<Inner>,
}

impl InMemorySupervisor {
    /// Create an empty supervisor with no layers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a connection error (or recover).
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().await.unreachable = unreachable;
    }

    /// Make a service exit immediately whenever it is started.
    pub async fn set_crash_on_start(&self, name: &str, crash: bool) {
        let mut inner = self.inner.lock().await;
        if crash {
            inner.crash_on_start.insert(name.to_string());
        } else {
            inner.crash_on_start.remove(name);
        }
    }

    /// Make starting a service fail the way a real supervisor reports a
    /// process that exits during startup.
    pub async fn set_reject_start(&self, name: &str, reject: bool) {
        let mut inner = self.inner.lock().await;
        if reject {
            inner.reject_start.insert(name.to_string());
        } else {
            inner.reject_start.remove(name);
        }
    }

    /// Simulate the process dying outside the supervisor's control.
    pub async fn kill(&self, name: &str) {
        self.inner.lock().await.running.remove(name);
    }

    /// Number of start requests a service has received.
    pub async fn start_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .await
            .starts
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    /// Number of stop requests a service has received.
    pub async fn stop_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .await
            .stops
            .get(name)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Supervisor for InMemorySupervisor {
    async fn get_plan(&self) -> Result<Plan> {
        let inner = self.inner.lock().await;
        inner.ensure_reachable()?;
        Ok(inner.plan())
    }

    async fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.ensure_reachable()?;
        let inner = &mut *guard;

        match inner.layers.get_mut(label) {
            Some(existing) if combine => {
                existing.summary.clone_from(&layer.summary);
                existing.description.clone_from(&layer.description);
                let mut combined = Plan {
                    services: std::mem::take(&mut existing.services),
                };
                combined.apply(layer);
                existing.services = combined.services;
            }
            Some(_) => {
                return Err(Error::api(400, format!("layer {label:?} already exists")));
            }
            None => {
                inner.layers.insert(label.to_string(), layer.clone());
                inner.order.push(label.to_string());
            }
        }

        debug!(label, services = layer.services.len(), "Layer added");
        Ok(())
    }

    async fn start_service(&self, name: &str) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.ensure_reachable()?;
        let inner = &mut *guard;

        if inner.plan().service(name).is_none() {
            return Err(Error::api(400, format!("service {name:?} does not exist")));
        }

        let count = inner.starts.entry(name.to_string()).or_default();
        *count = count.saturating_add(1);

        if inner.reject_start.contains(name) {
            return Err(Error::service_failed(format!(
                "cannot start service {name:?}: exited quickly with code 2"
            )));
        }
        if !inner.crash_on_start.contains(name) {
            inner.running.insert(name.to_string());
        }
        Ok(())
    }

    async fn stop_service(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.ensure_reachable()?;

        let count = inner.stops.entry(name.to_string()).or_default();
        *count = count.saturating_add(1);

        inner.running.remove(name);
        Ok(())
    }

    async fn is_running(&self, name: &str) -> Result<bool> {
        let inner = self.inner.lock().await;
        inner.ensure_reachable()?;
        Ok(inner.running.contains(name))
    }
}
