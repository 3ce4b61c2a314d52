//! Configuration snapshot model.
//!
//! A [`Snapshot`] is the full set of [`Source`]s (each with nested
//! [`Destination`]s) at one point in time. Snapshots are replaced wholesale,
//! never patched.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::ConfigMap;

/// Identifies a pipeline: one source paired with one of its destinations.
///
/// Formatted as `"{source_id}_{destination_id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(String);

impl PipelineId {
    /// Build the pipeline id for a source/destination pair.
    pub fn new(source_id: &str, destination_id: &str) -> Self {
        Self(format!("{source_id}_{destination_id}"))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PipelineId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Definition block describing a source's type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDefinition {
    /// Definition name, used as the source role in the registry.
    #[serde(default)]
    pub name: String,
    /// Category tag; only externally-syncable categories are reconciled.
    #[serde(default)]
    pub category: String,
}

/// Definition block describing a destination's target system type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationDefinition {
    /// Definition name, e.g. `POSTGRES`.
    #[serde(default)]
    pub name: String,
}

/// A destination attached to a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Unique within its source.
    pub id: String,
    /// Target system definition.
    #[serde(default)]
    pub destination_definition: DestinationDefinition,
    /// Flagged as deleted.
    #[serde(default)]
    pub deleted: bool,
    /// Whether the source-to-destination connection is enabled.
    #[serde(default)]
    pub is_connection_enabled: bool,
    /// Whether processing for this destination is enabled.
    #[serde(default)]
    pub is_processor_enabled: bool,
    /// Free-form destination configuration.
    #[serde(default)]
    pub config: ConfigMap,
}

impl Destination {
    /// Create an enabled, non-deleted destination with an empty payload.
    pub fn new(id: impl Into<String>, definition_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            destination_definition: DestinationDefinition {
                name: definition_name.into(),
            },
            deleted: false,
            is_connection_enabled: true,
            is_processor_enabled: true,
            config: ConfigMap::new(),
        }
    }

    /// Set the configuration payload.
    #[must_use]
    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = config;
        self
    }

    /// Set the deleted flag.
    #[must_use]
    pub const fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    /// Set the connection-enabled flag.
    #[must_use]
    pub const fn with_connection_enabled(mut self, enabled: bool) -> Self {
        self.is_connection_enabled = enabled;
        self
    }

    /// Set the processor-enabled flag.
    #[must_use]
    pub const fn with_processor_enabled(mut self, enabled: bool) -> Self {
        self.is_processor_enabled = enabled;
        self
    }

    /// The definition name of the target system.
    pub fn definition_name(&self) -> &str {
        &self.destination_definition.name
    }
}

/// A data source with its destinations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Stable, unique source id.
    pub id: String,
    /// Source type definition (name and category).
    #[serde(default)]
    pub source_definition: SourceDefinition,
    /// Flagged as deleted.
    #[serde(default)]
    pub deleted: bool,
    /// Free-form source configuration; may carry a `resources` list.
    #[serde(default)]
    pub config: ConfigMap,
    /// Destinations in configuration order.
    #[serde(default)]
    pub destinations: Vec<Destination>,
}

impl Source {
    /// Create a non-deleted source with no destinations.
    pub fn new(
        id: impl Into<String>,
        definition_name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_definition: SourceDefinition {
                name: definition_name.into(),
                category: category.into(),
            },
            deleted: false,
            config: ConfigMap::new(),
            destinations: Vec::new(),
        }
    }

    /// Set the configuration payload.
    #[must_use]
    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = config;
        self
    }

    /// Set the deleted flag.
    #[must_use]
    pub const fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    /// Append a destination.
    #[must_use]
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destinations.push(destination);
        self
    }

    /// The source's category tag.
    pub fn category(&self) -> &str {
        &self.source_definition.category
    }

    /// The source's definition name.
    pub fn definition_name(&self) -> &str {
        &self.source_definition.name
    }

    /// Find a destination by id. The first match wins.
    pub fn destination(&self, id: &str) -> Option<&Destination> {
        self.destinations.iter().find(|d| d.id == id)
    }

    /// Pipeline id for one of this source's destinations.
    pub fn pipeline_id(&self, destination: &Destination) -> PipelineId {
        PipelineId::new(&self.id, &destination.id)
    }
}

/// A data-integrity problem found in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityWarning {
    /// Two sources share one id.
    DuplicateSource { source_id: String },
    /// Two destinations of one source share one id.
    DuplicateDestination {
        source_id: String,
        destination_id: String,
    },
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateSource { source_id } => {
                write!(f, "duplicate source id '{source_id}'")
            }
            Self::DuplicateDestination {
                source_id,
                destination_id,
            } => write!(
                f,
                "duplicate destination id '{destination_id}' in source '{source_id}'"
            ),
        }
    }
}

/// Full configuration at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// All sources, in delivery order.
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Snapshot {
    /// Create a snapshot from a list of sources.
    pub const fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    /// Decode a snapshot from its JSON wire shape.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotDecodeFailed` when the JSON is malformed or does not
    /// match the snapshot shape.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and decode a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `FileReadFailed` if the file cannot be read, or
    /// `SnapshotDecodeFailed` if its content is not a snapshot.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        Self::from_json_str(&content)
    }

    /// Sources whose category matches `category`.
    pub fn sources_in_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a Source> + 'a {
        self.sources.iter().filter(move |s| s.category() == category)
    }

    /// Find a source by id. The first match wins.
    pub fn source(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Total number of destinations across all sources.
    pub fn destination_count(&self) -> usize {
        self.sources.iter().map(|s| s.destinations.len()).sum()
    }

    /// Report duplicate source ids and duplicate destination ids within a source,
    /// restricted to sources in `category`.
    pub fn integrity_warnings(&self, category: &str) -> Vec<IntegrityWarning> {
        let duplicate_sources = self
            .sources_in_category(category)
            .map(|s| s.id.as_str())
            .duplicates()
            .map(|id| IntegrityWarning::DuplicateSource {
                source_id: id.to_string(),
            });

        let duplicate_destinations = self.sources_in_category(category).flat_map(|source| {
            let mut seen = HashSet::new();
            source
                .destinations
                .iter()
                .filter(move |d| !seen.insert(d.id.as_str()))
                .map(|d| d.id.as_str())
                .unique()
                .map(|destination_id| IntegrityWarning::DuplicateDestination {
                    source_id: source.id.clone(),
                    destination_id: destination_id.to_string(),
                })
                .collect_vec()
        });

        duplicate_sources.chain(duplicate_destinations).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const WIRE: &str = r#"{
        "sources": [{
            "id": "src-1",
            "config": {"resources": ["users"]},
            "deleted": false,
            "sourceDefinition": {"name": "hubspot", "category": "cloud"},
            "destinations": [{
                "id": "dst-1",
                "config": {"user": "admin", "port": "5432"},
                "deleted": false,
                "isConnectionEnabled": true,
                "isProcessorEnabled": false,
                "destinationDefinition": {"name": "POSTGRES"}
            }]
        }]
    }"#;

    #[test]
    fn test_pipeline_id_joins_with_underscore() {
        assert_eq!(PipelineId::new("S1", "D1").as_str(), "S1_D1");
    }

    #[test]
    fn test_decode_wire_shape() -> Result<()> {
        let snapshot = Snapshot::from_json_str(WIRE)?;
        let source = snapshot.source("src-1");
        assert_eq!(source.map(Source::category), Some("cloud"));
        let destination = source.and_then(|s| s.destination("dst-1"));
        assert_eq!(destination.map(Destination::definition_name), Some("POSTGRES"));
        assert_eq!(destination.map(|d| d.is_processor_enabled), Some(false));
        assert_eq!(destination.map(|d| d.is_connection_enabled), Some(true));
        Ok(())
    }

    #[test]
    fn test_decode_defaults_missing_fields() -> Result<()> {
        let snapshot = Snapshot::from_json_str(r#"{"sources":[{"id":"a","destinations":[{"id":"b"}]}]}"#)?;
        let destination = snapshot.source("a").and_then(|s| s.destination("b"));
        assert_eq!(destination.map(|d| d.deleted), Some(false));
        assert_eq!(destination.map(|d| d.config.is_empty()), Some(true));
        Ok(())
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = Snapshot::from_json_str("not json");
        assert!(matches!(result, Err(Error::SnapshotDecodeFailed { .. })));
    }

    #[test]
    fn test_from_file() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(WIRE.as_bytes())?;
        let snapshot = Snapshot::from_file(file.path())?;
        assert_eq!(snapshot.destination_count(), 1);
        Ok(())
    }

    #[test]
    fn test_from_missing_file() {
        let result = Snapshot::from_file(Path::new("/nonexistent/snapshot.json"));
        assert!(matches!(result, Err(Error::FileReadFailed { .. })));
    }

    #[test]
    fn test_integrity_warnings_report_duplicates() {
        let snapshot = Snapshot::new(vec![
            Source::new("S1", "src", "cloud")
                .with_destination(Destination::new("D1", "POSTGRES"))
                .with_destination(Destination::new("D1", "POSTGRES")),
            Source::new("S1", "src", "cloud"),
            Source::new("S2", "src", "warehouse"),
            Source::new("S2", "src", "warehouse"),
        ]);

        let warnings = snapshot.integrity_warnings("cloud");

        assert_eq!(
            warnings,
            vec![
                IntegrityWarning::DuplicateSource {
                    source_id: "S1".to_string()
                },
                IntegrityWarning::DuplicateDestination {
                    source_id: "S1".to_string(),
                    destination_id: "D1".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_clean_snapshot_has_no_warnings() {
        let snapshot = Snapshot::new(vec![
            Source::new("S1", "src", "cloud")
                .with_destination(Destination::new("D1", "POSTGRES"))
                .with_destination(Destination::new("D2", "POSTGRES")),
        ]);
        assert!(snapshot.integrity_warnings("cloud").is_empty());
    }
}
