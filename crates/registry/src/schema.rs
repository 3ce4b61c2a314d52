//! Registry pipeline-configuration schema.
//!
//! This is the JSON body sent with `PUT /syncs/{id}`.

use serde::{Deserialize, Serialize};

use regsync_core::ConfigMap;

/// The only cadence the registry supports.
pub const ONCE_PER_HOUR: &str = "once_per_hour";

/// Source role and options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Source definition name.
    pub role: String,
    /// Full source configuration payload.
    pub options: ConfigMap,
}

/// Sink role and options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkSpec {
    /// Registry sink role; empty when the destination type is unsupported.
    pub role: String,
    /// Destination configuration after key renaming.
    pub options: ConfigMap,
}

/// Pipeline schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(rename = "type")]
    pub kind: String,
    pub times: String,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Schedule {
    /// The fixed hourly schedule.
    pub fn once_per_hour() -> Self {
        Self {
            kind: ONCE_PER_HOUR.to_string(),
            times: String::new(),
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::once_per_hour()
    }
}

/// A resource the pipeline syncs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub role: String,
}

/// Complete pipeline configuration understood by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub source: SourceSpec,
    pub sink: SinkSpec,
    pub schedule: Schedule,
    /// `None` serializes as `null` and means the source declared no resources.
    pub resources: Option<Vec<Resource>>,
    /// True when processing for the destination is disabled.
    pub paused: bool,
}
