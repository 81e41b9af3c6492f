//! Two-body orbit representation and the impulsive perturbation step.
//!
//! Orbit state vectors are body-relative and z-up. Vectors coming from the
//! vessel frame are y-up and are swapped on the way in.

pub mod kepler;

use pt_core::vector::{self, Vector3};
use thiserror::Error;
use tracing::trace;

pub use kepler::KeplerOrbit;

/// External orbit representation consumed by the background simulation.
pub trait Orbit {
    /// Body-relative position (m) at universal time `ut`.
    fn position_at(&self, ut: f64) -> Vector3;
    /// Body-relative velocity (m/s) at universal time `ut`.
    fn velocity_at(&self, ut: f64) -> Vector3;
    /// Replace the orbit with the conic through the given state at `ut`.
    fn reinitialize_from_state_vectors(
        &mut self,
        position: Vector3,
        velocity: Vector3,
        ut: f64,
    ) -> Result<(), OrbitError>;
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrbitError {
    #[error("gravitational parameter must be positive, got {0}")]
    InvalidMu(f64),
    #[error("position vector is degenerate")]
    DegeneratePosition,
    #[error("state vector contains non-finite components")]
    NonFinite,
}

/// Apply an impulsive velocity change expressed in the vessel frame.
///
/// Returns `Ok(false)` without touching the orbit when `delta_v` is exactly zero.
pub fn perturb<O: Orbit + ?Sized>(
    orbit: &mut O,
    delta_v: &Vector3,
    ut: f64,
) -> Result<bool, OrbitError> {
    if vector::is_zero(delta_v) {
        return Ok(false);
    }
    if !delta_v.iter().all(|c| c.is_finite()) {
        return Err(OrbitError::NonFinite);
    }
    let delta_orbit = vector::swap_yz(delta_v);
    let position = orbit.position_at(ut);
    let velocity = orbit.velocity_at(ut);
    let perturbed = vector::add(&velocity, &delta_orbit);
    trace!(ut, dv = vector::norm(delta_v), "orbit_perturbed");
    orbit.reinitialize_from_state_vectors(position, perturbed, ut)?;
    Ok(true)
}

