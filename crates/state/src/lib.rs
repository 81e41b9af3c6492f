//! Typed, versioned views over the name-keyed part module store.
//!
//! The host persists module fields as strings keyed by name. Everything in the
//! background simulation works with the typed schemas defined here; field names
//! only appear at this serialization boundary.

pub mod autopilot;
pub mod manifest;
pub mod modules;

use std::collections::BTreeMap;
use std::str::FromStr;

use thiserror::Error;

pub use autopilot::{AutopilotMode, AutopilotState, ManeuverPlan, TargetRef};
pub use manifest::ResourceManifest;
pub use modules::{EngineModuleState, ProcessState, ScaleSpec, SolarPanelState};

/// Current module schema version written by [`EngineModuleState::write_to`] and friends.
pub const SCHEMA_VERSION: u32 = 1;

/// Persisted field names.
pub mod fields {
    pub const SCHEMA_VERSION: &str = "schema_version";
    pub const THRUST: &str = "thrust";
    pub const ISP: &str = "isp";
    pub const THROTTLE: &str = "throttle";
    pub const HEADING_ALIGNMENT: &str = "heading_alignment";
    pub const RESOURCE_MANIFEST: &str = "resource_manifest";
    pub const ACTIVE: &str = "active";
    pub const DEPLOYED: &str = "deployed";
    pub const CHARGE_RATE: &str = "charge_rate";
    pub const OUTPUT_RESOURCE: &str = "output_resource";
    pub const INPUTS: &str = "inputs";
    pub const OUTPUTS: &str = "outputs";
    pub const DUMP_EXCESS: &str = "dump_excess";
    pub const SCALE_FACTOR: &str = "scale_factor";
    pub const SCALE_EXPONENT: &str = "scale_exponent";
    pub const AUTOPILOT_MODE: &str = "autopilot_mode";
    pub const TARGET: &str = "target";
    pub const MANEUVER: &str = "maneuver";
    pub const LAST_FOUND_RATIO: &str = "last_found_ratio";
    pub const LAST_BACKGROUND_UT: &str = "last_background_ut";
}

/// Errors surfaced while reading persisted module fields.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("missing field `{field}`")]
    Missing { field: &'static str },
    #[error("field `{field}` has malformed value `{value}`: {reason}")]
    Malformed {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Name-keyed string fields attached to one part module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleStateStore {
    fields: BTreeMap<String, String>,
}

impl ModuleStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Required field parsed with `FromStr`.
    pub fn require<T>(&self, field: &'static str) -> Result<T, StateError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get(field).ok_or(StateError::Missing { field })?;
        parse_field(field, raw)
    }

    /// Optional field parsed with `FromStr`; blank values count as absent.
    pub fn optional<T>(&self, field: &'static str) -> Result<Option<T>, StateError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(field) {
            Some(raw) if !raw.trim().is_empty() => parse_field(field, raw).map(Some),
            _ => Ok(None),
        }
    }

    /// Boolean field accepting `true/false`, `True/False`, and `1/0`.
    pub fn flag(&self, field: &'static str, default: bool) -> Result<bool, StateError> {
        match self.get(field).map(str::trim) {
            None | Some("") => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(StateError::Malformed {
                    field,
                    value: raw.to_string(),
                    reason: "expected a boolean".to_string(),
                }),
            },
        }
    }

    /// Reject stores written by a newer schema. A missing version is read as version 1.
    pub fn check_version(&self) -> Result<u32, StateError> {
        let version = self
            .optional::<u32>(fields::SCHEMA_VERSION)?
            .unwrap_or(1);
        if version > SCHEMA_VERSION {
            return Err(StateError::UnsupportedVersion {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(version)
    }

    pub(crate) fn stamp_version(&mut self) {
        self.set(fields::SCHEMA_VERSION, SCHEMA_VERSION.to_string());
    }
}

impl FromIterator<(String, String)> for ModuleStateStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl From<BTreeMap<String, String>> for ModuleStateStore {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }
}

fn parse_field<T>(field: &'static str, raw: &str) -> Result<T, StateError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|err| StateError::Malformed {
        field,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

/// Parse a finite `f64`, rejecting NaN and infinities.
pub(crate) fn finite(field: &'static str, value: f64) -> Result<f64, StateError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(StateError::Malformed {
            field,
            value: value.to_string(),
            reason: "value must be finite".to_string(),
        })
    }
}
