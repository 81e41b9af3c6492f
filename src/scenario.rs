//! Loading a complete fleet scenario from catalog files.

use std::path::{Path, PathBuf};

use pt_background::{Environment, Fleet, FleetError};
use pt_config::{ConfigError, SimulationConfig};
use pt_resources::{ResourceError, ResourceLibrary};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("{path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Fleet(#[from] FleetError),
}

/// Catalog locations. Each path may be a YAML file, a TOML file, or a directory of TOML files.
#[derive(Debug, Clone)]
pub struct ScenarioPaths {
    pub vessels: PathBuf,
    pub bodies: PathBuf,
    /// Stock resource library when absent.
    pub resources: Option<PathBuf>,
    /// Default tunables when absent.
    pub config: Option<PathBuf>,
}

/// Everything a scheduler run needs.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub config: SimulationConfig,
    pub library: ResourceLibrary,
    pub environment: Environment,
    pub fleet: Fleet,
}

impl Scenario {
    pub fn load(paths: &ScenarioPaths) -> Result<Self, ScenarioError> {
        let config = match &paths.config {
            Some(path) => pt_config::load_simulation_config(path).map_err(at(path))?,
            None => SimulationConfig::default(),
        };
        let library = match &paths.resources {
            Some(path) => {
                ResourceLibrary::from_configs(&pt_config::load_resources(path).map_err(at(path))?)?
            }
            None => ResourceLibrary::stock(),
        };
        let bodies = pt_config::load_bodies(&paths.bodies).map_err(at(&paths.bodies))?;
        let environment = Environment::from_configs(&bodies, config.negligible_flux)?;
        let vessels = pt_config::load_vessel_configs(&paths.vessels).map_err(at(&paths.vessels))?;
        let fleet = Fleet::from_configs(&vessels, &environment)?;
        info!(
            bodies = bodies.len(),
            vessels = fleet.len(),
            "scenario_loaded"
        );
        Ok(Self {
            config,
            library,
            environment,
            fleet,
        })
    }
}

fn at(path: &Path) -> impl Fn(ConfigError) -> ScenarioError + '_ {
    move |source| ScenarioError::Config {
        path: path.to_path_buf(),
        source,
    }
}
