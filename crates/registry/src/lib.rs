#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # regsync-registry
//!
//! Client and wire schema for the external pipeline registry.
//!
//! The registry is write-only from regsync's point of view:
//!
//! - `PUT {base}/syncs/{pipeline_id}` creates or updates a pipeline
//! - `DELETE {base}/syncs/{pipeline_id}` removes it
//!
//! Both calls are idempotent on the registry side. 200 and 202 mean success.
//!
//! ## Example
//!
//! ```ignore
//! use regsync_registry::{RegistryClient, RegistryConfig};
//!
//! let client = RegistryClient::with_config(RegistryConfig::default().from_env())?;
//! client.remove(&PipelineId::new("src", "dst")).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod schema;

pub use client::RegistryClient;
pub use config::{REGISTRY_URL_ENV, RegistryConfig};
pub use error::{Error, Result};
pub use schema::{ONCE_PER_HOUR, PipelineConfig, Resource, Schedule, SinkSpec, SourceSpec};
