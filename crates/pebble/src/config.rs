//! Configuration for the Pebble client.

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Environment variable holding the Pebble API base URL.
pub const URL_ENV: &str = "PEBBLE_URL";

/// Environment variable holding the request timeout in seconds.
pub const TIMEOUT_ENV: &str = "PEBBLE_TIMEOUT_SECS";

/// Base URL used when none is configured.
pub const DEFAULT_URL: &str = "http://127.0.0.1:4000/";

/// Configuration for the [`PebbleClient`](crate::PebbleClient).
#[derive(Debug, Clone)]
pub struct PebbleConfig {
    /// Base URL of the Pebble API.
    pub base_url: Url,

    /// Timeout for a single request.
    pub timeout: Duration,

    /// How long to wait for a start/stop change to finish.
    pub change_timeout: Duration,
}

impl PebbleConfig {
    /// Create a config for the given base URL.
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: default_timeout(),
            change_timeout: default_change_timeout(),
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the change wait timeout.
    #[must_use]
    pub const fn change_timeout(mut self, timeout: Duration) -> Self {
        self.change_timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `PEBBLE_URL` or `PEBBLE_TIMEOUT_SECS` is malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or the timeout is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = lookup(URL_ENV).unwrap_or_else(|| DEFAULT_URL.to_string());
        let mut config = Self::new(Url::parse(&url)?);

        if let Some(secs) = lookup(TIMEOUT_ENV) {
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|e| Error::config_error(format!("{TIMEOUT_ENV}: {e}")))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_change_timeout() -> Duration {
    Duration::from_secs(30)
}
