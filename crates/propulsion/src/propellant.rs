//! Propellant mixture bookkeeping.

use pt_core::ids::PartId;
use pt_resources::ResourceLibrary;
use pt_state::ResourceManifest;

use crate::PropulsionError;

/// One propellant drawn by an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PropellantSpec {
    pub resource: String,
    /// Mixture ratio by volume, as persisted.
    pub ratio: f64,
    /// Share of the engine's mass flow; zero for massless propellants.
    pub normalized_ratio: f64,
    /// Kilograms per unit.
    pub density_kg: f64,
    pub massless: bool,
    /// Units requested over the last tick.
    pub requested: f64,
    /// Units withdrawn over the last tick.
    pub committed: f64,
}

/// Resolve a manifest into specs whose mass-bearing normalized ratios sum to one.
pub(crate) fn build_specs(
    part: PartId,
    manifest: &ResourceManifest,
    library: &ResourceLibrary,
) -> Result<Vec<PropellantSpec>, PropulsionError> {
    if manifest.is_empty() {
        return Err(PropulsionError::EmptyManifest { part });
    }
    let mut specs = Vec::with_capacity(manifest.len());
    for (resource, ratio) in manifest.iter() {
        if ratio <= 0.0 || !ratio.is_finite() {
            return Err(PropulsionError::InvalidRatio {
                part,
                resource: resource.to_string(),
                ratio,
            });
        }
        let definition = library
            .get(resource)
            .map_err(|source| PropulsionError::Resource { part, source })?;
        specs.push(PropellantSpec {
            resource: resource.to_string(),
            ratio,
            normalized_ratio: 0.0,
            density_kg: definition.density_kg(),
            massless: definition.is_massless(),
            requested: 0.0,
            committed: 0.0,
        });
    }

    let mass_total: f64 = specs
        .iter()
        .filter(|s| !s.massless)
        .map(|s| s.ratio * s.density_kg)
        .sum();
    if mass_total <= 0.0 {
        return Err(PropulsionError::NoMassBearingPropellant { part });
    }
    for spec in specs.iter_mut().filter(|s| !s.massless) {
        spec.normalized_ratio = spec.ratio * spec.density_kg / mass_total;
    }
    Ok(specs)
}

/// Fill `requested` for a tick that burns `demand_mass` kilograms.
///
/// Massless propellants follow the mixture ratio against the total volume of
/// mass-bearing propellant drawn.
pub(crate) fn assign_requests(specs: &mut [PropellantSpec], demand_mass: f64) {
    let demand_mass = if demand_mass.is_finite() { demand_mass.max(0.0) } else { 0.0 };
    let mut mass_units = 0.0;
    let mut mass_ratio = 0.0;
    for spec in specs.iter_mut().filter(|s| !s.massless) {
        spec.requested = demand_mass * spec.normalized_ratio / spec.density_kg;
        mass_units += spec.requested;
        mass_ratio += spec.ratio;
    }
    for spec in specs.iter_mut().filter(|s| s.massless) {
        spec.requested = if mass_ratio > 0.0 {
            mass_units * spec.ratio / mass_ratio
        } else {
            0.0
        };
    }
}
