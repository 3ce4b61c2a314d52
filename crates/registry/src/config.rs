//! Configuration for the registry client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use regsync_core::PipelineId;

use crate::error::{Error, Result};

/// Environment variable holding the registry base URL.
pub const REGISTRY_URL_ENV: &str = "REGISTRY_URL";

/// Configuration for the `RegistryClient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the registry; pipelines live under `{base_url}/syncs/{id}`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout enforced by the HTTP client.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
        }
    }
}

impl RegistryConfig {
    /// Create a config pointing at the given registry.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Apply overrides from environment variables.
    #[must_use]
    pub fn from_env(self) -> Self {
        self.from_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` to resolve variable names.
    #[must_use]
    pub fn from_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(REGISTRY_URL_ENV) {
            self.base_url = url;
        }
        self
    }

    /// Parse and check the base URL.
    ///
    /// # Errors
    ///
    /// Returns `UrlParse` for malformed URLs and `InvalidUrl` for URLs that
    /// cannot carry a path (e.g. `mailto:`).
    pub fn parsed_base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)?;
        if url.cannot_be_a_base() {
            return Err(Error::invalid_url(format!(
                "'{}' cannot be a base",
                self.base_url
            )));
        }
        Ok(url)
    }

    /// URL of a single pipeline: `{base_url}/syncs/{pipeline_id}`.
    ///
    /// The pipeline id is percent-encoded as one path segment.
    ///
    /// # Errors
    ///
    /// Same as [`Self::parsed_base_url`].
    pub fn pipeline_url(&self, pipeline_id: &PipelineId) -> Result<Url> {
        let mut url = self.parsed_base_url()?;
        url.path_segments_mut()
            .map_err(|()| Error::invalid_url(format!("'{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("syncs")
            .push(pipeline_id.as_str());
        Ok(url)
    }
}

fn default_base_url() -> String {
    "http://localhost:8111".to_string()
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
