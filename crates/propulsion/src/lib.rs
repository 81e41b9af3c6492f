//! Engine records and the warp-mode thrust step.
//!
//! An [`EngineRecord`] is built from an engine's persisted module state and
//! advanced once per full background tick. Each advance computes propellant
//! demand from thrust and specific impulse, checks availability against the
//! vessel's ledger, records the withdrawal, and returns the resulting
//! velocity change along the requested heading.

pub mod propellant;
pub mod rocket;

use pt_config::SimulationConfig;
use pt_core::SlidingWindow;
use pt_core::ids::PartId;
use pt_core::ratio::{availability, clamp_unit};
use pt_core::units::kn_to_n;
use pt_core::vector::{self, Vector3, ZERO};
use pt_resources::{ResourceError, ResourceLedger, ResourceLibrary};
use pt_state::{EngineModuleState, StateError};
use thiserror::Error;
use tracing::{debug, info};

pub use propellant::PropellantSpec;
pub use rocket::{mass_flow_rate, tsiolkovsky_delta_v};

#[derive(Debug, Error, PartialEq)]
pub enum PropulsionError {
    #[error("{part}: engine state unreadable: {source}")]
    State {
        part: PartId,
        #[source]
        source: StateError,
    },
    #[error("{part}: resource manifest is empty")]
    EmptyManifest { part: PartId },
    #[error("{part}: mixture ratio for `{resource}` must be positive, got {ratio}")]
    InvalidRatio {
        part: PartId,
        resource: String,
        ratio: f64,
    },
    #[error("{part}: no propellant in the manifest has mass")]
    NoMassBearingPropellant { part: PartId },
    #[error("{part}: {source}")]
    Resource {
        part: PartId,
        #[source]
        source: ResourceError,
    },
}

/// Why an engine did nothing this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Inactive,
    NoThrust,
    Idle,
    NoHeading,
    Misaligned,
    NoElapsedTime,
    /// Vessel mass is at or below the configured floor.
    NoMass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Skipped(SkipReason),
    Burning,
    /// At least one propellant is completely unavailable.
    Depleted,
}

/// Outcome of one engine advance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineTick {
    pub part: PartId,
    pub status: EngineStatus,
    /// Instantaneous minimum availability across propellants.
    pub found_ratio: f64,
    /// Ratio actually applied to thrust and consumption after smoothing.
    pub applied_ratio: f64,
    pub effective_thrust_n: f64,
    /// Mass removed from the vessel, zero under infinite propellant.
    pub mass_consumed_kg: f64,
    /// Velocity change in the vessel frame.
    pub delta_v: Vector3,
}

impl EngineTick {
    fn skipped(part: PartId, reason: SkipReason) -> Self {
        Self {
            part,
            status: EngineStatus::Skipped(reason),
            found_ratio: 0.0,
            applied_ratio: 0.0,
            effective_thrust_n: 0.0,
            mass_consumed_kg: 0.0,
            delta_v: ZERO,
        }
    }

    pub fn delta_v_magnitude(&self) -> f64 {
        vector::norm(&self.delta_v)
    }
}

/// Per-tick inputs shared by every engine on a vessel.
#[derive(Debug, Clone, Copy)]
pub struct BurnContext<'a> {
    /// Unit heading in the vessel frame, zero when unresolved.
    pub heading: Vector3,
    pub facing: Vector3,
    /// Current vessel mass, already reduced by engines advanced earlier this tick.
    pub vessel_mass_kg: f64,
    pub elapsed: f64,
    pub config: &'a SimulationConfig,
}

/// Cached engine state owned by a vessel record.
#[derive(Debug, Clone)]
pub struct EngineRecord {
    pub part: PartId,
    pub propellants: Vec<PropellantSpec>,
    pub max_thrust_n: f64,
    pub active: bool,
    /// Alignment score last persisted by the foreground, if any.
    pub heading_alignment: Option<f64>,
    throttle: SlidingWindow,
    isp: SlidingWindow,
    found: SlidingWindow,
}

impl EngineRecord {
    pub fn from_state(
        part: PartId,
        state: &EngineModuleState,
        library: &ResourceLibrary,
        config: &SimulationConfig,
    ) -> Result<Self, PropulsionError> {
        let propellants = propellant::build_specs(part, &state.manifest, library)?;
        let mut record = Self {
            part,
            propellants,
            max_thrust_n: kn_to_n(state.thrust_kn).max(0.0),
            active: state.active,
            heading_alignment: state.heading_alignment,
            throttle: SlidingWindow::new(config.throttle_window),
            isp: SlidingWindow::new(config.isp_window),
            found: SlidingWindow::new(config.found_ratio_window),
        };
        record.observe_foreground(state.throttle, state.isp_s);
        Ok(record)
    }

    /// Take fresh thrust, activation, and smoothing samples from persisted state.
    pub fn refresh(&mut self, state: &EngineModuleState) {
        self.max_thrust_n = kn_to_n(state.thrust_kn).max(0.0);
        self.active = state.active;
        self.heading_alignment = state.heading_alignment;
        self.observe_foreground(state.throttle, state.isp_s);
    }

    /// Feed one throttle/Isp sample from the realtime engine loop.
    pub fn observe_foreground(&mut self, throttle: f64, isp_s: f64) {
        self.throttle.push(clamp_unit(throttle));
        if isp_s.is_finite() && isp_s > 0.0 {
            self.isp.push(isp_s);
        }
    }

    pub fn reset_windows(&mut self) {
        self.throttle.clear();
        self.isp.clear();
        self.found.clear();
    }

    pub fn smoothed_throttle(&self) -> f64 {
        clamp_unit(self.throttle.average_or(0.0))
    }

    pub fn smoothed_isp(&self) -> f64 {
        self.isp.average_or(0.0).max(0.0)
    }

    pub fn smoothed_found_ratio(&self) -> f64 {
        clamp_unit(self.found.average_or(1.0))
    }

    /// Advance the engine over `ctx.elapsed` seconds against `ledger`.
    pub fn advance(&mut self, ledger: &mut ResourceLedger, ctx: &BurnContext<'_>) -> EngineTick {
        for spec in &mut self.propellants {
            spec.requested = 0.0;
            spec.committed = 0.0;
        }

        if let Some(reason) = self.precondition(ctx) {
            debug!(part = %self.part, ?reason, "engine_skipped");
            return EngineTick::skipped(self.part, reason);
        }

        let throttle = self.smoothed_throttle();
        let isp = self.smoothed_isp();
        let elapsed = ctx.elapsed;
        let demand_mass = mass_flow_rate(self.max_thrust_n * throttle, isp) * elapsed;
        propellant::assign_requests(&mut self.propellants, demand_mass);

        let found_ratio = if ctx.config.infinite_propellant {
            1.0
        } else {
            self.propellants
                .iter()
                .map(|spec| {
                    availability(ledger.projected_available(&spec.resource, elapsed), spec.requested)
                })
                .fold(1.0, f64::min)
        };
        self.found.push(found_ratio);

        if found_ratio <= 0.0 {
            info!(
                part = %self.part,
                throttle,
                "engine_propellant_depleted"
            );
            return EngineTick {
                status: EngineStatus::Depleted,
                ..EngineTick::skipped(self.part, SkipReason::NoThrust)
            };
        }

        // The smoothed ratio damps recovery after intermittent starvation but
        // never lets consumption exceed what is available now.
        let applied_ratio = clamp_unit(self.smoothed_found_ratio().min(found_ratio));
        let mass_floor = ctx.config.min_remaining_mass_kg.max(0.0);
        let burnable = (ctx.vessel_mass_kg - mass_floor).max(0.0);
        let full_mass = demand_mass * applied_ratio;
        let burn_mass = full_mass.min(burnable);
        // Scale the draw down with the mass actually burned when the floor binds.
        let draw_ratio = if full_mass > burn_mass && full_mass > 0.0 {
            applied_ratio * burn_mass / full_mass
        } else {
            applied_ratio
        };

        if !ctx.config.infinite_propellant {
            for spec in &mut self.propellants {
                spec.committed = spec.requested * draw_ratio;
                ledger.record_change(&spec.resource, -spec.committed / elapsed);
            }
        }

        let dv = tsiolkovsky_delta_v(isp, ctx.vessel_mass_kg, burn_mass);
        let delta_v = vector::scale(&ctx.heading, dv);
        let effective_thrust_n = self.max_thrust_n * throttle * applied_ratio;

        debug!(
            part = %self.part,
            found_ratio,
            applied_ratio,
            effective_thrust_n,
            dv,
            "engine_burned"
        );

        EngineTick {
            part: self.part,
            status: EngineStatus::Burning,
            found_ratio,
            applied_ratio,
            effective_thrust_n,
            mass_consumed_kg: if ctx.config.infinite_propellant {
                0.0
            } else {
                burn_mass
            },
            delta_v,
        }
    }

    fn precondition(&self, ctx: &BurnContext<'_>) -> Option<SkipReason> {
        if !self.active {
            return Some(SkipReason::Inactive);
        }
        if self.max_thrust_n <= 0.0 || self.smoothed_isp() <= 0.0 {
            return Some(SkipReason::NoThrust);
        }
        if self.smoothed_throttle() <= 0.0 {
            return Some(SkipReason::Idle);
        }
        if ctx.elapsed <= 0.0 || !ctx.elapsed.is_finite() {
            return Some(SkipReason::NoElapsedTime);
        }
        if vector::is_zero(&ctx.heading) {
            return Some(SkipReason::NoHeading);
        }
        let tolerance = ctx.config.heading_alignment_tolerance;
        if self.heading_alignment.is_some_and(|score| score < tolerance) {
            return Some(SkipReason::Misaligned);
        }
        if pt_heading::alignment(&ctx.facing, &ctx.heading) < tolerance {
            return Some(SkipReason::Misaligned);
        }
        if ctx.vessel_mass_kg <= ctx.config.min_remaining_mass_kg.max(0.0) {
            return Some(SkipReason::NoMass);
        }
        None
    }
}
