//! Tick-driven selection and full advance of one background vessel.
//!
//! Every tick refreshes the snapshot of each eligible vessel, then fully
//! advances the single vessel that has gone longest without one. Within an
//! advance the order is producers, engines, ledger commit, orbit perturbation.

use std::collections::BTreeMap;

use pt_config::{ModuleKind, SimulationConfig};
use pt_core::ids::{PartId, VesselId};
use pt_core::vector::{self, Vector3, ZERO};
use pt_heading::{AutopilotMode, HeadingInputs};
use pt_producers::ProducerOutcome;
use pt_propulsion::{BurnContext, EngineStatus, EngineTick, PropulsionError};
use pt_resources::{CommitReport, LocalResourceProvider, ResourceLibrary, ResourceProvider};
use pt_state::{AutopilotState, EngineModuleState, TargetRef};
use tracing::{debug, info, warn};

use crate::fleet::{Environment, Fleet, Vessel};
use crate::record::{CacheState, VesselRecord};

/// Result of a full advance.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceReport {
    pub vessel: VesselId,
    pub elapsed: f64,
    /// `None` when the autopilot fields could not be read.
    pub mode: Option<AutopilotMode>,
    /// Resolved heading in the vessel frame; zero when unavailable.
    pub heading: Vector3,
    pub producers: Vec<ProducerOutcome>,
    pub engines: Vec<EngineTick>,
    /// Summed velocity change in the vessel frame.
    pub delta_v: Vector3,
    /// Engines whose propellant ran out this tick.
    pub depleted: Vec<PartId>,
    pub commit: CommitReport,
    pub orbit_changed: bool,
    pub mass_before_kg: f64,
    pub mass_after_kg: f64,
}

impl AdvanceReport {
    pub fn delta_v_magnitude(&self) -> f64 {
        vector::norm(&self.delta_v)
    }

    /// Mean instantaneous found ratio over engines that attempted a burn.
    pub fn mean_found_ratio(&self) -> Option<f64> {
        let burning: Vec<f64> = self
            .engines
            .iter()
            .filter(|e| matches!(e.status, EngineStatus::Burning | EngineStatus::Depleted))
            .map(|e| e.found_ratio)
            .collect();
        if burning.is_empty() {
            None
        } else {
            Some(burning.iter().sum::<f64>() / burning.len() as f64)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub ut: f64,
    /// Eligible vessels whose snapshots were refreshed, in id order.
    pub candidates: Vec<VesselId>,
    pub advanced: Option<AdvanceReport>,
}

/// Owns one record per background vessel and advances one of them per tick.
pub struct BackgroundScheduler<P: ResourceProvider = LocalResourceProvider> {
    config: SimulationConfig,
    library: ResourceLibrary,
    provider: P,
    records: BTreeMap<VesselId, VesselRecord>,
}

impl BackgroundScheduler<LocalResourceProvider> {
    pub fn local(config: SimulationConfig, library: ResourceLibrary) -> Self {
        Self::new(config, library, LocalResourceProvider)
    }
}

impl<P: ResourceProvider> BackgroundScheduler<P> {
    pub fn new(config: SimulationConfig, library: ResourceLibrary, provider: P) -> Self {
        debug!(provider = provider.name(), "background_scheduler_created");
        Self {
            config,
            library,
            provider,
            records: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn library(&self) -> &ResourceLibrary {
        &self.library
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn record(&self, id: VesselId) -> Option<&VesselRecord> {
        self.records.get(&id)
    }

    pub fn records(&self) -> impl Iterator<Item = &VesselRecord> {
        self.records.values()
    }

    /// Drop every record, as when a save is reloaded.
    pub fn reset(&mut self) {
        debug!(records = self.records.len(), "background_records_reset");
        self.records.clear();
    }

    pub fn tick(&mut self, fleet: &mut Fleet, environment: &Environment, ut: f64) -> TickReport {
        self.prune(fleet);

        let mut report = TickReport {
            ut,
            ..TickReport::default()
        };
        for id in fleet.ids().collect::<Vec<_>>() {
            let Some(vessel) = fleet.get(id) else {
                continue;
            };
            if !vessel.is_background_candidate() {
                continue;
            }
            self.refresh_snapshot(vessel, ut);
            report.candidates.push(id);
        }

        let Some((selected, elapsed)) = self.select(&report.candidates, ut) else {
            return report;
        };
        info!(vessel = %selected, elapsed_s = elapsed, "background_vessel_selected");

        report.advanced = self.advance(selected, fleet, environment, ut, elapsed);
        report
    }

    /// Forget vessels that were removed or loaded.
    fn prune(&mut self, fleet: &Fleet) {
        self.records.retain(|id, _| {
            let keep = fleet.get(*id).map(|v| !v.active).unwrap_or(false);
            if !keep {
                debug!(vessel = %id, "background_record_dropped");
            }
            keep
        });
    }

    fn refresh_snapshot(&mut self, vessel: &Vessel, ut: f64) {
        let record = self
            .records
            .entry(vessel.id)
            .or_insert_with(|| VesselRecord::new(vessel.id, ut, &self.config));

        if record.is_stale(vessel) {
            warn!(
                vessel = %vessel.id,
                revision = vessel.revision(),
                "vessel_cache_stale"
            );
            record.invalidate();
        }
        if record.cache == CacheState::Uninitialized {
            record.discover(vessel, &self.library, &self.config);
        }

        record.mass_kg = vessel.total_mass_kg(&self.library);
        self.provider
            .snapshot(vessel.id, &vessel.storage, &mut record.ledger);

        if record.cache == CacheState::NoActiveEngine {
            record.last_advanced_ut = ut;
        }
    }

    /// Largest elapsed time wins; ties go to the lowest id.
    fn select(&self, candidates: &[VesselId], ut: f64) -> Option<(VesselId, f64)> {
        let mut best: Option<(VesselId, f64)> = None;
        for id in candidates {
            let Some(record) = self.records.get(id) else {
                continue;
            };
            if record.cache != CacheState::HasActiveEngine {
                continue;
            }
            let elapsed = record.elapsed(ut);
            if elapsed <= 0.0 {
                continue;
            }
            if best.map(|(_, e)| elapsed > e).unwrap_or(true) {
                best = Some((*id, elapsed));
            }
        }
        best
    }

    fn advance(
        &mut self,
        id: VesselId,
        fleet: &mut Fleet,
        environment: &Environment,
        ut: f64,
        elapsed: f64,
    ) -> Option<AdvanceReport> {
        let (mode, heading) = {
            let vessel = fleet.get(id)?;
            match self.read_autopilot(vessel) {
                Some(autopilot) => (
                    Some(autopilot.mode),
                    resolve_heading(vessel, &autopilot, fleet, environment, ut),
                ),
                None => (None, ZERO),
            }
        };

        let vessel = fleet.get_mut(id)?;
        let record = self.records.get_mut(&id)?;
        if self.config.autopilot_reorients
            && mode.is_some_and(|m| m != AutopilotMode::StabilityAssist)
            && !vector::is_zero(&heading)
        {
            vessel.facing = heading;
        }
        record.ledger.begin_tick();
        self.provider
            .snapshot(id, &vessel.storage, &mut record.ledger);

        let position = vessel.absolute_position(environment, ut);
        let mut producers = Vec::new();
        for records in record.producers.values() {
            for producer in records {
                producers.push(producer.simulate(
                    &mut record.ledger,
                    environment.illumination(),
                    &position,
                    elapsed,
                ));
            }
        }

        let mass_before_kg = vessel.total_mass_kg(&self.library);
        let mut mass = mass_before_kg;
        let mut engines = Vec::new();
        let mut delta_v = ZERO;
        let mut depleted = Vec::new();
        let parts: Vec<PartId> = record.engines.keys().copied().collect();
        for part in parts {
            let state = vessel
                .part(part)
                .and_then(|p| p.module(ModuleKind::Engine))
                .map(|m| EngineModuleState::from_store(&m.store));
            let state = match state {
                Some(Ok(state)) => state,
                Some(Err(source)) => {
                    record.warn_part(part, &PropulsionError::State { part, source });
                    continue;
                }
                None => continue,
            };
            let Some(engine) = record.engines.get_mut(&part) else {
                continue;
            };
            engine.refresh(&state);
            let tick = engine.advance(
                &mut record.ledger,
                &BurnContext {
                    heading,
                    facing: vessel.facing,
                    vessel_mass_kg: mass,
                    elapsed,
                    config: &self.config,
                },
            );
            mass = (mass - tick.mass_consumed_kg).max(0.0);
            delta_v = vector::add(&delta_v, &tick.delta_v);
            if tick.status == EngineStatus::Depleted {
                depleted.push(part);
            }
            engines.push(tick);
        }
        if !depleted.is_empty() {
            info!(vessel = %id, engines = depleted.len(), "background_propellant_depleted");
        }

        let commit = self
            .provider
            .commit(id, &mut vessel.storage, &mut record.ledger, elapsed);

        let orbit_changed = match pt_orbits::perturb(&mut vessel.orbit, &delta_v, ut) {
            Ok(changed) => changed,
            Err(error) => {
                warn!(vessel = %id, error = %error, "orbit_perturbation_failed");
                false
            }
        };

        for tick in &engines {
            if let Some(module) = vessel
                .part_mut(tick.part)
                .and_then(|p| p.module_mut(ModuleKind::Engine))
            {
                EngineModuleState::write_background_result(&mut module.store, tick.found_ratio, ut);
            }
        }

        record.last_advanced_ut = ut;
        let mass_after_kg = vessel.total_mass_kg(&self.library);
        record.mass_kg = mass_after_kg;
        debug!(
            vessel = %id,
            elapsed_s = elapsed,
            dv = vector::norm(&delta_v),
            mass_kg = mass_after_kg,
            "background_vessel_advanced"
        );

        Some(AdvanceReport {
            vessel: id,
            elapsed,
            mode,
            heading,
            producers,
            engines,
            delta_v,
            depleted,
            commit,
            orbit_changed,
            mass_before_kg,
            mass_after_kg,
        })
    }

    /// Unreadable autopilot fields resolve to no heading.
    fn read_autopilot(&mut self, vessel: &Vessel) -> Option<AutopilotState> {
        match AutopilotState::from_store(&vessel.autopilot) {
            Ok(state) => Some(state),
            Err(error) => {
                if let Some(record) = self.records.get_mut(&vessel.id) {
                    record.warn_autopilot(&error);
                }
                None
            }
        }
    }
}

fn resolve_heading(
    vessel: &Vessel,
    autopilot: &AutopilotState,
    fleet: &Fleet,
    environment: &Environment,
    ut: f64,
) -> Vector3 {
    let body_position = environment.body_position(&vessel.body);
    let target = autopilot.target.as_ref().and_then(|target| match target {
        TargetRef::Vessel(other) => fleet
            .get(*other)
            .filter(|other| other.id != vessel.id)
            .map(|other| other.absolute_position(environment, ut)),
        TargetRef::Body(name) => environment.body(name).map(|b| b.position),
    });
    if autopilot.target.is_some() && target.is_none() {
        debug!(vessel = %vessel.id, "autopilot_target_unresolved");
    }
    let burn = autopilot
        .maneuver
        .as_ref()
        .map(|plan| pt_heading::maneuver_burn_vector(&vessel.orbit, plan));

    let inputs = HeadingInputs::sample(&vessel.orbit, ut, &body_position, vessel.facing)
        .with_target(target)
        .with_maneuver(burn);
    let heading = pt_heading::resolve(autopilot.mode, &inputs);
    if vector::is_zero(&heading) {
        debug!(vessel = %vessel.id, mode = %autopilot.mode, "heading_unavailable");
    }
    heading
}
