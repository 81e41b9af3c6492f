//! Resource definitions, part storage, and the per-vessel ledger.

pub mod ledger;
pub mod provider;

use std::collections::BTreeMap;

use pt_config::ResourceConfig;
use pt_core::ids::PartId;
use pt_core::units::tonnes_to_kg;
use thiserror::Error;

pub use ledger::{CommitReport, LedgerEntry, ResourceLedger};
pub use provider::{
    CompanionResourceProvider, LocalResourceProvider, ResourceProvider, ResourceRequest,
};

pub const ELECTRIC_CHARGE: &str = "ElectricCharge";

/// Consumable definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDefinition {
    pub name: String,
    /// Tonnes per unit; zero for massless resources.
    pub density_t: f64,
}

impl ResourceDefinition {
    pub fn is_massless(&self) -> bool {
        self.density_t <= 0.0
    }

    /// Kilograms per unit.
    pub fn density_kg(&self) -> f64 {
        tonnes_to_kg(self.density_t)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ResourceError {
    #[error("resource `{0}` is not defined")]
    Unknown(String),
    #[error("resource `{0}` defined twice")]
    Duplicate(String),
}

/// Lookup table of resource definitions.
#[derive(Debug, Clone, Default)]
pub struct ResourceLibrary {
    definitions: BTreeMap<String, ResourceDefinition>,
}

impl ResourceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library with the commonly used propellants and electric charge.
    pub fn stock() -> Self {
        let mut library = Self::new();
        for (name, density_t) in [
            (ELECTRIC_CHARGE, 0.0),
            ("LiquidFuel", 0.005),
            ("Oxidizer", 0.005),
            ("MonoPropellant", 0.004),
            ("XenonGas", 0.0001),
            ("ArgonGas", 0.00005),
            ("Ore", 0.01),
            ("LqdHydrogen", 0.00007085),
        ] {
            library.insert(ResourceDefinition {
                name: name.to_string(),
                density_t,
            });
        }
        library
    }

    pub fn from_configs(configs: &[ResourceConfig]) -> Result<Self, ResourceError> {
        let mut library = Self::new();
        for config in configs {
            if library.definitions.contains_key(&config.name) {
                return Err(ResourceError::Duplicate(config.name.clone()));
            }
            library.insert(ResourceDefinition {
                name: config.name.clone(),
                density_t: config.density_t_per_unit,
            });
        }
        Ok(library)
    }

    pub fn insert(&mut self, definition: ResourceDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Result<&ResourceDefinition, ResourceError> {
        self.definitions
            .get(name)
            .ok_or_else(|| ResourceError::Unknown(name.to_string()))
    }

    /// Kilograms per unit, zero for unknown resources.
    pub fn density_kg(&self, name: &str) -> f64 {
        self.definitions
            .get(name)
            .map(ResourceDefinition::density_kg)
            .unwrap_or(0.0)
    }
}

/// Stock of one resource held by one part.
#[derive(Debug, Clone, PartialEq)]
pub struct PartStorage {
    pub part: PartId,
    pub resource: String,
    pub amount: f64,
    pub max_amount: f64,
    /// Flow-locked storage is invisible to the background simulation.
    pub locked: bool,
}

impl PartStorage {
    pub fn new(part: PartId, resource: impl Into<String>, amount: f64, max_amount: f64) -> Self {
        let max_amount = max_amount.max(0.0);
        Self {
            part,
            resource: resource.into(),
            amount: amount.clamp(0.0, max_amount),
            max_amount,
            locked: false,
        }
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Current stock clamped into `[0, max]`.
    pub fn clamped_amount(&self) -> f64 {
        self.amount.clamp(0.0, self.max_amount.max(0.0))
    }

    pub fn free(&self) -> f64 {
        (self.max_amount - self.clamped_amount()).max(0.0)
    }

    pub fn mass_kg(&self, library: &ResourceLibrary) -> f64 {
        self.clamped_amount() * library.density_kg(&self.resource)
    }
}
