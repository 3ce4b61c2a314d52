//! Error types for the registry crate.

use thiserror::Error;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the pipeline registry.
#[derive(Error, Debug)]
pub enum Error {
    /// The registry answered with a status other than 200 or 202.
    #[error("{method} {url} returned unexpected status {status}")]
    UnexpectedStatus {
        method: String,
        url: String,
        status: u16,
    },

    /// The request URL could not be built from the base URL and pipeline id.
    #[error("invalid registry URL: {reason}")]
    InvalidUrl { reason: String },

    /// Configuration error.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// HTTP error from reqwest (connection, timeout, body encoding).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Create an unexpected status error.
    pub fn unexpected_status(method: impl Into<String>, url: impl Into<String>, status: u16) -> Self {
        Self::UnexpectedStatus {
            method: method.into(),
            url: url.into(),
            status,
        }
    }

    /// Create an invalid URL error.
    pub fn invalid_url(reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            reason: reason.into(),
        }
    }

    /// Create a config error.
    pub fn config_error(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }

    /// Whether the failure happened before any response was received.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}
