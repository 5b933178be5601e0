//! # mlflow-core
//!
//! Shared building blocks for the MLflow operator crates:
//!
//! - **Errors**: the file and parsing failures every crate can hit
//! - **Result**: the `Result` alias plus a logging extension
//! - **Config**: the operator's user-facing configuration surface (`host`, `port`)

pub mod config;
pub mod error;
pub mod result;

pub use config::{OperatorConfig, Port};
pub use error::Error;
pub use result::{Result, ResultExt};
