//! Engine and producer module schemas.

use std::collections::BTreeSet;

use crate::{ModuleStateStore, ResourceManifest, StateError, fields, finite};

/// Fields the realtime engine loop persists for the background path.
///
/// Units: thrust in kN, specific impulse in seconds, throttle in `[0, 1]`.
/// The manifest lists propellant mixture ratios by volume.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineModuleState {
    pub thrust_kn: f64,
    pub isp_s: f64,
    pub throttle: f64,
    /// Last alignment score written by the foreground, if any.
    pub heading_alignment: Option<f64>,
    pub manifest: ResourceManifest,
    pub active: bool,
}

impl EngineModuleState {
    pub fn from_store(store: &ModuleStateStore) -> Result<Self, StateError> {
        store.check_version()?;
        let thrust_kn = finite(fields::THRUST, store.require(fields::THRUST)?)?;
        let isp_s = finite(fields::ISP, store.require(fields::ISP)?)?;
        let throttle: f64 = finite(fields::THROTTLE, store.require(fields::THROTTLE)?)?;
        let heading_alignment = store
            .optional::<f64>(fields::HEADING_ALIGNMENT)?
            .map(|v| finite(fields::HEADING_ALIGNMENT, v))
            .transpose()?;
        let manifest: ResourceManifest = store.require(fields::RESOURCE_MANIFEST)?;
        let active = store.flag(fields::ACTIVE, true)?;

        Ok(Self {
            thrust_kn,
            isp_s,
            throttle: throttle.clamp(0.0, 1.0),
            heading_alignment,
            manifest,
            active,
        })
    }

    pub fn write_to(&self, store: &mut ModuleStateStore) {
        store.stamp_version();
        store.set(fields::THRUST, self.thrust_kn.to_string());
        store.set(fields::ISP, self.isp_s.to_string());
        store.set(fields::THROTTLE, self.throttle.to_string());
        match self.heading_alignment {
            Some(score) => store.set(fields::HEADING_ALIGNMENT, score.to_string()),
            None => {
                store.remove(fields::HEADING_ALIGNMENT);
            }
        }
        store.set(fields::RESOURCE_MANIFEST, self.manifest.to_string());
        store.set(fields::ACTIVE, self.active.to_string());
    }

    /// Persist the outcome of a background advance so the foreground can resume from it.
    pub fn write_background_result(store: &mut ModuleStateStore, found_ratio: f64, ut: f64) {
        store.set(fields::LAST_FOUND_RATIO, found_ratio.to_string());
        store.set(fields::LAST_BACKGROUND_UT, ut.to_string());
    }
}

/// Geometric rescale applied to producer rates: `factor.powf(exponent)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleSpec {
    pub factor: f64,
    pub exponent: f64,
}

impl ScaleSpec {
    pub fn multiplier(&self) -> f64 {
        let m = self.factor.max(0.0).powf(self.exponent);
        if m.is_finite() { m } else { 1.0 }
    }

    fn from_store(store: &ModuleStateStore) -> Result<Option<Self>, StateError> {
        let factor = store.optional::<f64>(fields::SCALE_FACTOR)?;
        let Some(factor) = factor else {
            return Ok(None);
        };
        let factor = finite(fields::SCALE_FACTOR, factor)?;
        let exponent = store.optional::<f64>(fields::SCALE_EXPONENT)?.unwrap_or(2.0);
        Ok(Some(Self {
            factor,
            exponent: finite(fields::SCALE_EXPONENT, exponent)?,
        }))
    }
}

/// Ambient-light collector fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SolarPanelState {
    pub deployed: bool,
    /// Output per second at the light source's reference distance.
    pub charge_rate: f64,
    pub output_resource: String,
    pub scale: Option<ScaleSpec>,
}

impl SolarPanelState {
    pub fn from_store(store: &ModuleStateStore) -> Result<Self, StateError> {
        store.check_version()?;
        let charge_rate = finite(fields::CHARGE_RATE, store.require(fields::CHARGE_RATE)?)?;
        Ok(Self {
            deployed: store.flag(fields::DEPLOYED, true)?,
            charge_rate,
            output_resource: store
                .get(fields::OUTPUT_RESOURCE)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "ElectricCharge".to_string()),
            scale: ScaleSpec::from_store(store)?,
        })
    }
}

/// Generator or converter fields: per-second inputs and outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessState {
    pub active: bool,
    pub inputs: ResourceManifest,
    pub outputs: ResourceManifest,
    /// Outputs that may be discarded when storage is full.
    pub dump_excess: BTreeSet<String>,
    pub scale: Option<ScaleSpec>,
}

impl ProcessState {
    pub fn from_store(store: &ModuleStateStore) -> Result<Self, StateError> {
        store.check_version()?;
        let inputs = store
            .optional::<ResourceManifest>(fields::INPUTS)?
            .unwrap_or_default();
        let outputs: ResourceManifest = store.require(fields::OUTPUTS)?;
        for (field, manifest) in [(fields::INPUTS, &inputs), (fields::OUTPUTS, &outputs)] {
            if let Some((name, rate)) = manifest.iter().find(|(_, rate)| *rate < 0.0) {
                return Err(StateError::Malformed {
                    field,
                    value: format!("{name}={rate}"),
                    reason: "rates must be non-negative".to_string(),
                });
            }
        }
        let dump_excess = store
            .get(fields::DUMP_EXCESS)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            active: store.flag(fields::ACTIVE, false)?,
            inputs,
            outputs,
            dump_excess,
            scale: ScaleSpec::from_store(store)?,
        })
    }
}
