//! Configuration models and loaders for Persistent Thrust.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use pt_core::vector::Vector3;
use serde::Deserialize;
use thiserror::Error;

/// Tunables for the background simulation.
///
/// Every field has a default so partial files are accepted.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Minimum dot product between vessel facing and requested heading for thrust to apply.
    pub heading_alignment_tolerance: f64,
    /// Capacity of the smoothed throttle history.
    pub throttle_window: usize,
    /// Capacity of the smoothed specific impulse history.
    pub isp_window: usize,
    /// Capacity of the found-ratio history used to damp intermittent starvation.
    pub found_ratio_window: usize,
    /// Stock below this amount is treated as empty when pro-rating commits.
    pub resource_epsilon: f64,
    /// Light source contributions below this relative flux are ignored.
    pub negligible_flux: f64,
    /// Cheat: propellant availability is always satisfied.
    pub infinite_propellant: bool,
    /// Burns never reduce vessel mass below this many kilograms.
    pub min_remaining_mass_kg: f64,
    /// Unloaded vessels with an engaged autopilot mode are turned to the
    /// resolved heading before the alignment check.
    pub autopilot_reorients: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            heading_alignment_tolerance: 0.995,
            throttle_window: 10,
            isp_window: 10,
            found_ratio_window: 10,
            resource_epsilon: 1e-9,
            negligible_flux: 1e-4,
            infinite_propellant: false,
            min_remaining_mass_kg: 1e-3,
            autopilot_reorients: true,
        }
    }
}

/// Consumable definition. Zero density marks a massless resource such as electric charge.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ResourceConfig {
    pub name: String,
    /// Tonnes per unit.
    #[serde(default)]
    pub density_t_per_unit: f64,
}

/// Celestial body used as an orbit reference, light source, or occluder.
#[derive(Debug, Deserialize, Clone)]
pub struct BodyConfig {
    pub name: String,
    pub mu_m3_s2: f64,
    pub radius_m: f64,
    #[serde(default)]
    pub position_m: Vector3,
    /// Relative flux delivered at `reference_distance_m`; `None` for bodies that do not emit light.
    #[serde(default)]
    pub luminosity: Option<f64>,
    #[serde(default)]
    pub reference_distance_m: Option<f64>,
}

/// Host classification of a vessel.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VesselKind {
    Ship,
    Probe,
    Station,
    Lander,
    Rover,
    Base,
    Relay,
    Plane,
    Debris,
    Flag,
    SpaceObject,
    DeployedScience,
    EvaKerbal,
    Unknown,
}

impl VesselKind {
    /// Kinds that carry working parts and can thrust.
    pub fn is_physical_craft(self) -> bool {
        !matches!(
            self,
            VesselKind::Debris
                | VesselKind::Flag
                | VesselKind::SpaceObject
                | VesselKind::DeployedScience
                | VesselKind::EvaKerbal
                | VesselKind::Unknown
        )
    }
}

/// Flight situation reported by the host.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Situation {
    Landed,
    Splashed,
    Prelaunch,
    Flying,
    SubOrbital,
    Orbiting,
    Escaping,
    Docked,
}

impl Situation {
    /// Situations where an on-rails vessel follows a conic and may be perturbed.
    pub fn is_on_trajectory(self) -> bool {
        !matches!(
            self,
            Situation::Landed | Situation::Splashed | Situation::Prelaunch
        )
    }
}

/// Kind of part module carried in a scenario.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Engine,
    SolarPanel,
    Generator,
    Converter,
    /// Modules the background simulation does not model.
    #[serde(other)]
    Other,
}

/// One persisted part module: its kind and the name-keyed fields the host stores for it.
#[derive(Debug, Deserialize, Clone)]
pub struct ModuleConfig {
    pub kind: ModuleKind,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// Resource stock held by a part.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub resource: String,
    pub amount: f64,
    pub max_amount: f64,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PartConfig {
    pub id: u64,
    pub name: String,
    pub dry_mass_t: f64,
    #[serde(default)]
    pub resources: Vec<StorageConfig>,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

/// Orbit given as body-relative state vectors at `epoch_s`.
#[derive(Debug, Deserialize, Clone)]
pub struct OrbitConfig {
    pub body: String,
    pub position_m: Vector3,
    pub velocity_m_s: Vector3,
    #[serde(default)]
    pub epoch_s: f64,
}

/// Vessel record parsed from scenario catalogs.
#[derive(Debug, Deserialize, Clone)]
pub struct VesselConfig {
    pub id: u64,
    pub name: String,
    pub kind: VesselKind,
    pub situation: Situation,
    /// True for the vessel currently under full physics.
    #[serde(default)]
    pub active: bool,
    /// Facing in the vessel-local (y-up) frame.
    pub facing: Vector3,
    pub orbit: OrbitConfig,
    /// Autopilot fields as persisted by the host (mode, target, maneuver).
    #[serde(default)]
    pub autopilot: BTreeMap<String, String>,
    pub parts: Vec<PartConfig>,
}

/// Errors that can occur while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Load simulation tunables from a TOML or YAML file.
pub fn load_simulation_config<P: AsRef<Path>>(path: P) -> Result<SimulationConfig, ConfigError> {
    let path = path.as_ref();
    let config: SimulationConfig = if is_toml(path) {
        toml::from_str(&std::fs::read_to_string(path)?)?
    } else {
        serde_yaml::from_reader(File::open(path)?)?
    };
    validate_simulation(&config)?;
    Ok(config)
}

/// Load resource definitions from a YAML file, TOML file, or directory of TOML files.
pub fn load_resources<P: AsRef<Path>>(path: P) -> Result<Vec<ResourceConfig>, ConfigError> {
    let resources: Vec<ResourceConfig> = load_records(path)?;
    for resource in &resources {
        if resource.density_t_per_unit < 0.0 || !resource.density_t_per_unit.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "resource `{}` has invalid density {}",
                resource.name, resource.density_t_per_unit
            )));
        }
    }
    Ok(resources)
}

/// Load celestial bodies.
pub fn load_bodies<P: AsRef<Path>>(path: P) -> Result<Vec<BodyConfig>, ConfigError> {
    let bodies: Vec<BodyConfig> = load_records(path)?;
    for body in &bodies {
        if body.mu_m3_s2 <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "body `{}` must have a positive gravitational parameter",
                body.name
            )));
        }
    }
    Ok(bodies)
}

/// Load vessel configurations.
pub fn load_vessel_configs<P: AsRef<Path>>(path: P) -> Result<Vec<VesselConfig>, ConfigError> {
    load_records(path)
}

fn validate_simulation(config: &SimulationConfig) -> Result<(), ConfigError> {
    if !(-1.0..=1.0).contains(&config.heading_alignment_tolerance) {
        return Err(ConfigError::Invalid(format!(
            "heading_alignment_tolerance must lie in [-1, 1], got {}",
            config.heading_alignment_tolerance
        )));
    }
    if config.resource_epsilon < 0.0 || config.negligible_flux < 0.0 {
        return Err(ConfigError::Invalid(
            "epsilons must be non-negative".to_string(),
        ));
    }
    Ok(())
}

fn is_toml(path: &Path) -> bool {
    path.extension().map(|ext| ext == "toml").unwrap_or(false)
}

fn load_records<T, P>(path: P) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if path.is_dir() {
        read_dir_records(path)
    } else if is_toml(path) {
        let contents = std::fs::read_to_string(path)?;
        let record: T = toml::from_str(&contents)?;
        Ok(vec![record])
    } else {
        let reader = File::open(path)?;
        Ok(serde_yaml::from_reader(reader)?)
    }
}

fn read_dir_records<T>(dir: &Path) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    let mut records = Vec::new();
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_toml(path))
        .collect();
    entries.sort();
    for path in entries {
        let contents = std::fs::read_to_string(&path)?;
        let record: T = toml::from_str(&contents)?;
        records.push(record);
    }
    Ok(records)
}
