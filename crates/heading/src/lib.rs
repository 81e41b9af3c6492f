//! Thrust heading resolution from autopilot mode and orbital state.
//!
//! All vectors here are in the vessel (y-up) frame. Because the y/z swap
//! flips handedness, `velocity × radius` in this frame is the orbit normal
//! and `normal × velocity` points radially outward.

use pt_core::vector::{self, Vector3, ZERO};
use pt_orbits::Orbit;
use pt_state::ManeuverPlan;

pub use pt_state::AutopilotMode;

/// Orbital and reference state sampled at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingInputs {
    pub velocity: Vector3,
    pub position: Vector3,
    pub body_position: Vector3,
    pub target_position: Option<Vector3>,
    pub maneuver_burn: Option<Vector3>,
    pub facing: Vector3,
}

impl HeadingInputs {
    /// Sample an orbit at `ut`. `body_position` is the reference body's
    /// position in the orbit (z-up) frame.
    pub fn sample<O: Orbit + ?Sized>(
        orbit: &O,
        ut: f64,
        body_position: &Vector3,
        facing: Vector3,
    ) -> Self {
        let relative = orbit.position_at(ut);
        let absolute = vector::add(body_position, &relative);
        Self {
            velocity: vector::swap_yz(&orbit.velocity_at(ut)),
            position: vector::swap_yz(&absolute),
            body_position: vector::swap_yz(body_position),
            target_position: None,
            maneuver_burn: None,
            facing,
        }
    }

    /// Attach a target position given in the orbit frame.
    pub fn with_target(mut self, target_position: Option<Vector3>) -> Self {
        self.target_position = target_position.map(|p| vector::swap_yz(&p));
        self
    }

    /// Attach a burn vector already in the vessel frame.
    pub fn with_maneuver(mut self, burn: Option<Vector3>) -> Self {
        self.maneuver_burn = burn;
        self
    }
}

/// Unit heading for `mode`, or the zero vector when the mode's reference is unavailable.
pub fn resolve(mode: AutopilotMode, inputs: &HeadingInputs) -> Vector3 {
    let radius = vector::sub(&inputs.position, &inputs.body_position);
    let normal = vector::cross(&inputs.velocity, &radius);
    match mode {
        AutopilotMode::StabilityAssist => vector::normalize(&inputs.facing),
        AutopilotMode::Prograde => vector::normalize(&inputs.velocity),
        AutopilotMode::Retrograde => vector::normalize(&vector::neg(&inputs.velocity)),
        AutopilotMode::Normal => vector::normalize(&normal),
        AutopilotMode::AntiNormal => vector::normalize(&vector::neg(&normal)),
        AutopilotMode::RadialOut => {
            vector::normalize(&vector::cross(&normal, &inputs.velocity))
        }
        AutopilotMode::RadialIn => {
            vector::normalize(&vector::cross(&inputs.velocity, &normal))
        }
        AutopilotMode::Target => inputs
            .target_position
            .map(|t| vector::normalize(&vector::sub(&t, &inputs.position)))
            .unwrap_or(ZERO),
        AutopilotMode::AntiTarget => inputs
            .target_position
            .map(|t| vector::normalize(&vector::sub(&inputs.position, &t)))
            .unwrap_or(ZERO),
        AutopilotMode::Maneuver => inputs
            .maneuver_burn
            .map(|burn| vector::normalize(&burn))
            .unwrap_or(ZERO),
    }
}

/// Burn vector for a planned patch transition, in the vessel frame.
pub fn maneuver_burn_vector<O: Orbit + ?Sized>(orbit: &O, plan: &ManeuverPlan) -> Vector3 {
    let current = orbit.velocity_at(plan.node_ut);
    vector::swap_yz(&vector::sub(&plan.patch_velocity, &current))
}

/// Dot product of the normalised facing with a unit heading.
///
/// Returns `-1.0` when either vector has no direction so that callers
/// comparing against a tolerance always treat it as misaligned.
pub fn alignment(facing: &Vector3, heading: &Vector3) -> f64 {
    let facing = vector::normalize(facing);
    if vector::is_zero(&facing) || vector::is_zero(heading) {
        return -1.0;
    }
    vector::dot(&facing, heading).clamp(-1.0, 1.0)
}
