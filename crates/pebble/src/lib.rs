#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # mlflow-pebble
//!
//! Client for the Pebble process supervisor's v1 HTTP API.
//!
//! [`PebbleClient`] implements [`mlflow_reconciler::Supervisor`], so the
//! reconciler can drive a real container:
//!
//! - read the combined plan (`GET /v1/plan`)
//! - add a layer (`POST /v1/layers`)
//! - start and stop services, waiting for the resulting change
//! - query whether a service is active (`GET /v1/services`)
//!
//! ## Example
//!
//! ```ignore
//! use mlflow_pebble::{PebbleClient, PebbleConfig};
//!
//! let client = PebbleClient::with_config(PebbleConfig::from_env()?)?;
//! let plan = client.plan().await?;
//! println!("{} services", plan.services.len());
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::PebbleClient;
pub use config::PebbleConfig;
pub use error::{Error, Result};
pub use types::{ServiceAction, ServiceInfo, ServiceStatus};
