//! `name=value;name=value` resource manifests.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Ordered list of resource names and signed amounts.
///
/// Engines persist their propellant mixture this way; converters persist
/// their per-second inputs and outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceManifest {
    entries: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ManifestParseError(String);

impl ResourceManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Later entries for the same name are rejected by the parser, not here.
    pub fn push(&mut self, resource: impl Into<String>, amount: f64) {
        self.entries.push((resource.into(), amount));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, amount)| (name.as_str(), *amount))
    }

    pub fn get(&self, resource: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == resource)
            .map(|(_, amount)| *amount)
    }
}

impl FromStr for ResourceManifest {
    type Err = ManifestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut manifest = ResourceManifest::new();
        for raw in s.split(';') {
            let entry = raw.trim();
            if entry.is_empty() {
                continue;
            }
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| ManifestParseError(format!("entry `{entry}` lacks `=`")))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ManifestParseError(format!(
                    "entry `{entry}` has an empty resource name"
                )));
            }
            let amount: f64 = value.trim().parse().map_err(|_| {
                ManifestParseError(format!("entry `{entry}` has a non-numeric amount"))
            })?;
            if !amount.is_finite() {
                return Err(ManifestParseError(format!(
                    "entry `{entry}` has a non-finite amount"
                )));
            }
            if manifest.get(name).is_some() {
                return Err(ManifestParseError(format!("resource `{name}` listed twice")));
            }
            manifest.push(name, amount);
        }
        Ok(manifest)
    }
}

impl fmt::Display for ResourceManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (name, amount)) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str(";")?;
            }
            write!(f, "{name}={amount}")?;
        }
        Ok(())
    }
}
