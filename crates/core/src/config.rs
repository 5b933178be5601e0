//! Operator configuration.
//!
//! The configuration surface is deliberately small: the address the tracking
//! server binds to. Changing either value changes the rendered service command
//! and therefore forces a restart on the next reconciliation.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::result::{Result, ResultExt};

/// Environment variable overriding [`OperatorConfig::host`].
pub const HOST_ENV: &str = "MLFLOW_HOST";

/// Environment variable overriding [`OperatorConfig::port`].
pub const PORT_ENV: &str = "MLFLOW_PORT";

/// User-facing operator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Address the tracking server listens on.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the tracking server listens on.
    #[serde(default)]
    pub port: Port,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: Port::default(),
        }
    }
}

impl OperatorConfig {
    /// Set the host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    #[must_use]
    pub const fn port(mut self, port: Port) -> Self {
        self.port = port;
        self
    }

    /// Load configuration from a file.
    ///
    /// The format follows the extension: `.json`, `.yaml`/`.yml`, anything
    /// else is read as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| Error::json_parse_failed(e.to_string()))
            }
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).map_err(|e| Error::yaml_parse_failed(e.to_string()))
            }
            _ => toml::from_str(&content).map_err(|e| Error::toml_parse_failed(e.to_string())),
        }
    }

    /// Apply `MLFLOW_HOST` / `MLFLOW_PORT` from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// An unparsable port is logged and ignored.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = lookup(HOST_ENV).filter(|h| !h.trim().is_empty()) {
            self.host = host;
        }

        if let Some(port) = lookup(PORT_ENV).and_then(|p| p.parse::<Port>().into_option_logged()) {
            self.port = port;
        }

        self
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// TCP port of the tracking server.
///
/// The host platform hands configuration values around as strings, so a port
/// deserializes from either a number or a numeric string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PortValue", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Create a port.
    #[must_use]
    pub const fn new(port: u16) -> Self {
        Self(port)
    }

    /// Get the port number.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl Default for Port {
    fn default() -> Self {
        Self(5000)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Port {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u16>()
            .map(Self)
            .map_err(|e| Error::invalid_config("port", format!("'{s}': {e}")))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

impl TryFrom<PortValue> for Port {
    type Error = Error;

    fn try_from(value: PortValue) -> Result<Self> {
        match value {
            PortValue::Number(n) => Ok(Self(n)),
            PortValue::Text(s) => s.parse(),
        }
    }
}
