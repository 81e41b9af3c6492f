//! Background simulation of unloaded vessels.
//!
//! [`BackgroundScheduler::tick`] is called once per host tick. It keeps a
//! [`VesselRecord`] for each eligible unloaded vessel and fully advances the
//! one that has waited longest: producers, engines, the resource commit, and
//! finally the orbit perturbation.

pub mod fleet;
pub mod record;
pub mod scheduler;

use pt_core::ids::{PartId, VesselId};
use pt_orbits::OrbitError;
use thiserror::Error;

pub use fleet::{Body, Environment, Fleet, Module, Part, Vessel};
pub use record::{CacheState, VesselRecord};
pub use scheduler::{AdvanceReport, BackgroundScheduler, TickReport};

/// Errors raised while building the host model from configuration.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("{vessel}: unknown reference body `{body}`")]
    UnknownBody { vessel: VesselId, body: String },
    #[error("{vessel}: invalid orbit: {source}")]
    Orbit {
        vessel: VesselId,
        #[source]
        source: OrbitError,
    },
    #[error("{0} is listed more than once")]
    DuplicateVessel(VesselId),
    #[error("{vessel}: {part} is listed more than once")]
    DuplicatePart { vessel: VesselId, part: PartId },
    #[error("body `{0}` is listed more than once")]
    DuplicateBody(String),
    #[error("body `{body}` is invalid: {reason}")]
    InvalidBody { body: String, reason: String },
}
