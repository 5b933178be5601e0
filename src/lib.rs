#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # mlflow-operator
//!
//! Command-line front end of the MLflow tracking server operator.
//!
//! This library re-exports the workspace crates for convenience.

pub use mlflow_charm;
pub use mlflow_core;
pub use mlflow_pebble;
pub use mlflow_reconciler;

pub mod cli;
pub mod commands;
