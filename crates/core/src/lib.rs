#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # regsync-core
//!
//! Configuration snapshot model for regsync.
//!
//! This crate provides:
//! - [`Snapshot`], [`Source`] and [`Destination`], decoded from the
//!   source-of-truth wire shape
//! - [`ConfigValue`] / [`ConfigMap`], a closed value type for free-form
//!   payloads with order-independent structural equality
//! - [`PipelineId`], the `source_destination` pipeline identity
//! - Integrity checks for duplicate ids within a snapshot

pub mod error;
pub mod model;
pub mod value;

pub use error::{Error, Result};
pub use model::{
    Destination, DestinationDefinition, IntegrityWarning, PipelineId, Snapshot, Source,
    SourceDefinition,
};
pub use value::{ConfigMap, ConfigValue, config_map_from_json};
