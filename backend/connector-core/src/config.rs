//! Connector configuration.
//!
//! The embedding extension owns persistence; this crate only defines the
//! settings struct, its defaults and validation.

use crate::error::config::ConfigError;
use crate::{CLIENT_VERSION, HOST_APP_BASE_URL};

use common::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_RECONNECT_BACKOFF_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Base URL of the host app, no trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Version string sent in the `X-Client-Version` header.
    #[serde(default = "default_client_version")]
    pub client_version: String,

    /// Probe connectivity at most once and trust the cached flag after
    /// that. Used in environments without a persistent push channel,
    /// where a known-offline host should fail calls immediately instead
    /// of stalling on the network.
    #[serde(default)]
    pub probe_once: bool,

    /// Delay before retrying an event-stream connection that failed
    /// without ever opening.
    #[serde(default = "default_reconnect_backoff_secs")]
    pub reconnect_backoff_secs: u64,

    /// Per-request timeout applied by the HTTP transport.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            client_version: default_client_version(),
            probe_once: false,
            reconnect_backoff_secs: default_reconnect_backoff_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    HOST_APP_BASE_URL.to_string()
}
fn default_client_version() -> String {
    CLIENT_VERSION.to_string()
}
fn default_reconnect_backoff_secs() -> u64 {
    DEFAULT_RECONNECT_BACKOFF_SECS
}
fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl ConnectorConfig {
    /// Config pointing at a specific host app URL, defaults elsewhere.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::Validation {
                reason: format!("Invalid base URL: {}", self.base_url),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Validation {
                reason: format!("Base URL must be http(s): {}", self.base_url),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.client_version.is_empty() {
            return Err(ConfigError::Validation {
                reason: "client_version cannot be empty".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                reason: "request_timeout_secs must be non-zero".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(())
    }

    /// Base URL with any trailing slash removed, for endpoint joining.
    pub(crate) fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
