//! # mlflow-charm
//!
//! Event handling for an operator that runs an MLflow tracking server under a
//! process supervisor.
//!
//! - [`relations`]: database and object-storage payloads
//! - [`buckets`]: the artifact bucket on the object store
//! - [`context`]: the desired service definition, rebuilt on every pass
//! - [`operator`]: one handler per host event
//! - [`dispatch`]: deferred events are re-delivered before new ones
//! - [`state`]: what survives between deliveries

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod buckets;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod operator;
pub mod relations;
pub mod state;
pub mod status;

pub use buckets::{BucketProvisioner, InMemoryBuckets, S3BucketProvisioner};
pub use context::WorkloadContext;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use event::{
    ActionOutcome, DbUpgradeParams, EventReport, HookContext, IngressRequest, OperatorEvent,
};
pub use operator::Operator;
pub use relations::{DatabaseRelation, ObjectStorageRelation, RelationSnapshot, TlsVerification};
pub use state::{OperatorState, StateStore};
pub use status::UnitStatus;
