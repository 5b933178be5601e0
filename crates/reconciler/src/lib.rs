//! Declarative reconciliation of a single supervised service.
//!
//! The reconciler follows the familiar desired/actual pattern:
//!
//! - **Desired State**: a [`ServiceSpec`] built fresh from configuration and relation data
//! - **Actual State**: the service entry of the supervisor's current [`Plan`]
//! - **Diff**: [`diff`] compares both after dropping empty fields
//! - **Action**: [`ReconcileAction::Replace`] is realised as add-layer, stop, start
//!
//! Repeated reconciliation with unchanged inputs never restarts the process.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mlflow_reconciler::{InMemorySupervisor, PendingRestart, ReconcilerBuilder, ServiceSpec};
//!
//! let reconciler = ReconcilerBuilder::new()
//!     .with_supervisor(Arc::new(InMemorySupervisor::new()))
//!     .build()?;
//!
//! let mut pending = PendingRestart::default();
//! let spec = ServiceSpec::new("mlflow server --port 5000");
//! let result = reconciler.reconcile(&spec, &mut pending).await?;
//! assert!(result.action.is_replace());
//! ```

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod reconciler;
pub mod supervisor;
pub mod types;

// Re-export main types
pub use error::{Error, Result};
pub use reconciler::{Reconciler, ReconcilerBuilder, ReconcilerConfig, diff};
pub use supervisor::{InMemorySupervisor, Supervisor};
pub use types::{
    Layer, Override, PendingRestart, Plan, ReconcileAction, ReconcileResult, ServiceFields,
    ServiceSpec, Startup,
};
