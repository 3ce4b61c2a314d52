//! Registry client for applying and removing pipelines.
//!
//! Every call is a single HTTP request. Failures are logged at error level
//! and returned to the caller; nothing is retried here.

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use tracing::{debug, error};
use url::Url;

use regsync_core::PipelineId;

use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::schema::PipelineConfig;

/// Client for the external pipeline registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// Configuration for the client.
    config: Arc<RegistryConfig>,
    /// Underlying HTTP client.
    http_client: reqwest::Client,
}

impl RegistryClient {
    /// Create a new client with default configuration.
    ///
    /// # Errors
    ///
    /// See [`Self::with_config`].
    pub fn new() -> Result<Self> {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new client with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        config.parsed_base_url()?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config_error(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }

    /// Create a new client for the registry at `base_url`.
    ///
    /// # Errors
    ///
    /// See [`Self::with_config`].
    pub fn with_url(base_url: impl Into<String>) -> Result<Self> {
        Self::with_config(RegistryConfig::with_base_url(base_url))
    }

    /// Create or update a pipeline: `PUT {base}/syncs/{id}` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedStatus` for any status other than 200/202, and
    /// `Http` for transport failures. Both are also logged.
    pub async fn apply(&self, pipeline_id: &PipelineId, config: &PipelineConfig) -> Result<()> {
        debug!(pipeline_id = %pipeline_id, "Putting pipeline to registry");
        self.request(Method::PUT, pipeline_id, Some(config)).await
    }

    /// Delete a pipeline: `DELETE {base}/syncs/{id}` with no body.
    ///
    /// Removing a pipeline the registry does not hold is expected to succeed.
    ///
    /// # Errors
    ///
    /// Same as [`Self::apply`].
    pub async fn remove(&self, pipeline_id: &PipelineId) -> Result<()> {
        debug!(pipeline_id = %pipeline_id, "Deleting pipeline from registry");
        self.request(Method::DELETE, pipeline_id, None).await
    }

    /// Get the configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    async fn request(
        &self,
        method: Method,
        pipeline_id: &PipelineId,
        body: Option<&PipelineConfig>,
    ) -> Result<()> {
        let url = self.config.pipeline_url(pipeline_id).inspect_err(|e| {
            error!(method = %method, pipeline_id = %pipeline_id, error = %e, "Failed to build registry request");
        })?;

        let builder = self
            .http_client
            .request(method.clone(), url.clone())
            .header(CONTENT_TYPE, "application/json");
        let builder = match body {
            Some(config) => builder.json(config),
            None => builder,
        };

        let response = builder.send().await.inspect_err(|e| {
            error!(method = %method, url = %url, error = %e, "Failed to execute registry request");
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if is_success(status) {
            debug!(method = %method, url = %url, status = status.as_u16(), body = %body, "Registry request succeeded");
            Ok(())
        } else {
            error!(method = %method, url = %url, status = status.as_u16(), body = %body, "Registry returned error response");
            Err(unexpected(&method, &url, status))
        }
    }
}

/// 200 and 202 are the only statuses the registry uses for success.
fn is_success(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::ACCEPTED
}

fn unexpected(method: &Method, url: &Url, status: StatusCode) -> Error {
    Error::unexpected_status(method.as_str(), url.as_str(), status.as_u16())
}
