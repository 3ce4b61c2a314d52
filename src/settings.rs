//! Startup settings: defaults, then an optional TOML file, then environment.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use regsync_reconciler::{LoopConfig, ReconcilerConfig};
use regsync_registry::RegistryConfig;

use crate::feed::FeedConfig;

pub const MAX_IN_FLIGHT_ENV: &str = "REGISTRY_MAX_IN_FLIGHT";

/// Everything the `run` command needs, read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default, rename = "loop")]
    pub loop_config: LoopConfig,
}

impl Settings {
    /// Load settings from `path` (if any) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(base.from_lookup(|key| std::env::var(key).ok()))
    }

    /// Parse a TOML settings file; missing tables take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        Ok(settings)
    }

    /// Reject values the feed and loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.feed.poll_interval_secs == 0 {
            bail!("feed.poll_interval_secs must be at least 1");
        }
        if self.loop_config.max_in_flight == 0 {
            bail!("loop.max_in_flight must be at least 1");
        }
        Ok(())
    }

    /// Apply environment overrides using `lookup` to resolve variable names.
    #[must_use]
    pub fn from_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.registry = self.registry.from_lookup(&lookup);
        self.feed = self.feed.from_lookup(&lookup);

        if let Some(raw) = lookup(MAX_IN_FLIGHT_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.loop_config.max_in_flight = n,
                _ => warn!(value = %raw, "Ignoring invalid {MAX_IN_FLIGHT_ENV}"),
            }
        }
        self
    }
}
