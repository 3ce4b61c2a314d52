//! Schema mapper: internal (source, destination) pair to registry pipeline config.
//!
//! Mapping never fails. Malformed fields degrade to a documented fallback and
//! are reported as [`MappingWarning`]s:
//!
//! - unknown destination types map to the empty sink role
//! - a non-numeric `port` string is dropped from the sink options
//! - non-string `resources` entries are skipped

use std::fmt;

use regsync_core::{ConfigMap, ConfigValue, Destination, Source};
use regsync_registry::{PipelineConfig, Resource, Schedule, SinkSpec, SourceSpec};

/// Destination definition names the registry has a sink for.
const SINK_ROLES: &[(&str, &str)] = &[("POSTGRES", "postgres")];

/// Destination key naming the connecting principal.
const PRINCIPAL_KEY: &str = "user";
/// Registry field the principal is renamed to.
const USERNAME_KEY: &str = "username";
const PORT_KEY: &str = "port";
const RESOURCES_KEY: &str = "resources";

/// A field that could not be mapped as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingWarning {
    /// No sink role for this destination definition; the role is left empty.
    UnsupportedSink { definition_name: String },
    /// `port` text is not an integer; the field is omitted.
    MalformedPort { value: String },
    /// `port` is neither text nor an integer; the field is omitted.
    UnsupportedPortType { kind: &'static str },
    /// Both `user` and `username` were present; `user` won.
    UsernameOverwritten,
    /// `resources` is not a list; no resources are sent.
    MalformedResources { kind: &'static str },
    /// A `resources` entry is not a string; it is skipped.
    NonStringResource { index: usize, kind: &'static str },
}

impl fmt::Display for MappingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedSink { definition_name } => {
                write!(f, "no sink role for destination type '{definition_name}'")
            }
            Self::MalformedPort { value } => {
                write!(f, "port '{value}' is not an integer, omitted")
            }
            Self::UnsupportedPortType { kind } => {
                write!(f, "port of type {kind} is not supported, omitted")
            }
            Self::UsernameOverwritten => {
                write!(f, "both '{PRINCIPAL_KEY}' and '{USERNAME_KEY}' set, '{PRINCIPAL_KEY}' used")
            }
            Self::MalformedResources { kind } => {
                write!(f, "resources of type {kind} is not a list, ignored")
            }
            Self::NonStringResource { index, kind } => {
                write!(f, "resource #{index} of type {kind} is not a string, skipped")
            }
        }
    }
}

/// A mapped pipeline config plus any warnings raised while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPipeline {
    pub config: PipelineConfig,
    pub warnings: Vec<MappingWarning>,
}

/// Look up the registry sink role for a destination definition name.
pub fn sink_role(definition_name: &str) -> Option<&'static str> {
    SINK_ROLES
        .iter()
        .find(|(name, _)| *name == definition_name)
        .map(|(_, role)| *role)
}

/// Map one (source, destination) pair into the registry schema.
pub fn map_config(source: &Source, destination: &Destination) -> MappedPipeline {
    let mut warnings = Vec::new();

    let role = sink_role(destination.definition_name()).unwrap_or_else(|| {
        warnings.push(MappingWarning::UnsupportedSink {
            definition_name: destination.definition_name().to_string(),
        });
        ""
    });

    let options = map_sink_options(&destination.config, &mut warnings);
    let resources = map_resources(&source.config, &mut warnings);

    MappedPipeline {
        config: PipelineConfig {
            source: SourceSpec {
                role: source.definition_name().to_string(),
                options: source.config.clone(),
            },
            sink: SinkSpec {
                role: role.to_string(),
                options,
            },
            schedule: Schedule::once_per_hour(),
            resources,
            paused: !destination.is_processor_enabled,
        },
        warnings,
    }
}

/// Rename the principal key and parse a textual port; everything else passes through.
fn map_sink_options(config: &ConfigMap, warnings: &mut Vec<MappingWarning>) -> ConfigMap {
    let mut options: ConfigMap = config
        .iter()
        .filter(|(key, _)| key.as_str() != PRINCIPAL_KEY && key.as_str() != PORT_KEY)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if let Some(user) = config.get(PRINCIPAL_KEY) {
        if options.insert(USERNAME_KEY.to_string(), user.clone()).is_some() {
            warnings.push(MappingWarning::UsernameOverwritten);
        }
    }

    if let Some(port) = config.get(PORT_KEY).and_then(|value| map_port(value, warnings)) {
        options.insert(PORT_KEY.to_string(), port);
    }

    options
}

fn map_port(value: &ConfigValue, warnings: &mut Vec<MappingWarning>) -> Option<ConfigValue> {
    match value {
        ConfigValue::String(text) => match text.trim().parse::<i64>() {
            Ok(port) => Some(ConfigValue::from(port)),
            Err(_) => {
                warnings.push(MappingWarning::MalformedPort {
                    value: text.clone(),
                });
                None
            }
        },
        ConfigValue::Number(_) => Some(value.clone()),
        other => {
            warnings.push(MappingWarning::UnsupportedPortType { kind: other.kind() });
            None
        }
    }
}

fn map_resources(config: &ConfigMap, warnings: &mut Vec<MappingWarning>) -> Option<Vec<Resource>> {
    let value = config.get(RESOURCES_KEY)?;
    let Some(items) = value.as_list() else {
        warnings.push(MappingWarning::MalformedResources { kind: value.kind() });
        return None;
    };

    let resources = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match item.as_str() {
            Some(role) => Some(Resource {
                role: role.to_string(),
            }),
            None => {
                warnings.push(MappingWarning::NonStringResource {
                    index,
                    kind: item.kind(),
                });
                None
            }
        })
        .collect();

    Some(resources)
}
