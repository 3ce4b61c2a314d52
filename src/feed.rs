//! Snapshot feed: polls the configuration backend for workspace snapshots.
//!
//! Every tick fetches the full workspace configuration. A snapshot is pushed
//! onto the feed channel only when it differs from the last one pushed, so an
//! idle workspace produces no reconciliation passes. Failed fetches are logged
//! and retried on the next tick.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use regsync_core::Snapshot;

pub const CONFIG_BACKEND_URL_ENV: &str = "CONFIG_BACKEND_URL";
pub const WORKSPACE_TOKEN_ENV: &str = "WORKSPACE_TOKEN";
pub const POLL_INTERVAL_ENV: &str = "REGISTRY_POLL_INTERVAL_SECS";

const WORKSPACE_CONFIG_PATH: &str = "workspaceConfig";

/// Errors from a single feed poll.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid config backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("config backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("config backend returned status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("config backend returned an unreadable snapshot: {0}")]
    Decode(#[from] regsync_core::Error),

    #[error("poll interval must be at least one second")]
    ZeroPollInterval,
}

/// Where and how often to poll.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Sent as the basic-auth user with an empty password.
    #[serde(default)]
    pub workspace_token: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedConfig")
            .field("backend_url", &self.backend_url)
            .field("workspace_token", &"<redacted>")
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            workspace_token: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend_url() -> String {
    "https://api.rudderlabs.com".to_string()
}

const fn default_poll_interval_secs() -> u64 {
    5
}

const fn default_timeout_secs() -> u64 {
    30
}

impl FeedConfig {
    /// Apply overrides using `lookup` to resolve variable names.
    ///
    /// An unparseable poll interval is ignored with a warning.
    #[must_use]
    pub fn from_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(CONFIG_BACKEND_URL_ENV) {
            self.backend_url = url;
        }
        if let Some(token) = lookup(WORKSPACE_TOKEN_ENV) {
            self.workspace_token = token;
        }
        if let Some(raw) = lookup(POLL_INTERVAL_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.poll_interval_secs = secs,
                _ => warn!(value = %raw, "Ignoring invalid {POLL_INTERVAL_ENV}"),
            }
        }
        self
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// `{backend_url}/workspaceConfig?fetchAll=true`
    pub fn workspace_config_url(&self) -> Result<Url, FeedError> {
        let mut url = Url::parse(&self.backend_url)?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(WORKSPACE_CONFIG_PATH);
        }
        url.query_pairs_mut().append_pair("fetchAll", "true");
        Ok(url)
    }
}

/// Handle for stopping a running feed.
#[derive(Debug)]
pub struct FeedHandle {
    stop_tx: watch::Sender<bool>,
}

impl FeedHandle {
    /// Stop polling. The feed channel closes once the task exits.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Polls the configuration backend and publishes changed snapshots.
pub struct ConfigFeed {
    config: FeedConfig,
    url: Url,
    http_client: reqwest::Client,
    last_published: Option<Snapshot>,
}

impl ConfigFeed {
    /// Create a feed from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend URL is invalid, the poll interval is
    /// zero, or the HTTP client cannot be built.
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        if config.poll_interval_secs == 0 {
            return Err(FeedError::ZeroPollInterval);
        }
        let url = config.workspace_config_url()?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            url,
            http_client,
            last_published: None,
        })
    }

    /// Fetch the current workspace snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a body
    /// that does not decode as a snapshot.
    pub async fn fetch(&self) -> Result<Snapshot, FeedError> {
        let response = self
            .http_client
            .get(self.url.clone())
            .basic_auth(&self.config.workspace_token, Some(""))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(Snapshot::from_json_str(&body)?)
    }

    /// Fetch once and publish when the snapshot changed.
    ///
    /// Returns `false` when the receiving side of the feed is gone.
    pub async fn poll_once(&mut self, tx: &mpsc::UnboundedSender<Snapshot>) -> bool {
        let snapshot = match self.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Failed to fetch workspace config");
                return !tx.is_closed();
            }
        };

        if self.last_published.as_ref() == Some(&snapshot) {
            debug!("Workspace config unchanged");
            return true;
        }

        debug!(sources = snapshot.sources.len(), "Publishing changed workspace config");
        if tx.send(snapshot.clone()).is_err() {
            return false;
        }
        self.last_published = Some(snapshot);
        true
    }

    /// Spawn the polling task. The first poll happens immediately.
    pub fn start(mut self, tx: mpsc::UnboundedSender<Snapshot>) -> (FeedHandle, JoinHandle<()>) {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let task = tokio::spawn(async move {
            info!(url = %self.url, interval = ?self.config.poll_interval(), "Config feed started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !self.poll_once(&tx).await {
                            break;
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Config feed stopped");
        });

        (FeedHandle { stop_tx }, task)
    }
}
