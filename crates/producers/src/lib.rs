//! Non-engine resource producers advanced against a vessel's ledger.

pub mod light;

use pt_config::ModuleKind;
use pt_core::ids::PartId;
use pt_core::ratio::{availability, clamp_unit};
use pt_core::vector::Vector3;
use pt_resources::ResourceLedger;
use pt_state::{ModuleStateStore, ProcessState, ResourceManifest, SolarPanelState, StateError};
use thiserror::Error;
use tracing::trace;

pub use light::{Illumination, LightSource, Occluder};

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("{part}: {source}")]
    State {
        part: PartId,
        #[source]
        source: StateError,
    },
    #[error("{part}: {kind:?} modules are not producers")]
    NotAProducer { part: PartId, kind: ModuleKind },
}

/// Per-tick result for one producer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProducerOutcome {
    pub part: PartId,
    /// Fraction of requested inputs that were available, in `[0, 1]`.
    pub found_ratio: f64,
    /// Fraction of nominal output actually recorded, in `[0, 1]`.
    pub output_ratio: f64,
    pub status: ProducerStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerStatus {
    Inactive,
    /// No light reaches a deployed collector.
    Dark,
    /// A required input is missing.
    Starved,
    /// Every output without a dump flag is full.
    StorageFull,
    Producing,
}

/// Ambient-light collector.
#[derive(Debug, Clone, PartialEq)]
pub struct SolarCollector {
    pub deployed: bool,
    pub charge_rate: f64,
    pub output_resource: String,
    pub multiplier: f64,
}

/// Steady-rate input → output process. Generators and converters share the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Process {
    pub active: bool,
    pub inputs: ResourceManifest,
    pub outputs: ResourceManifest,
    pub dump_excess: Vec<String>,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProducerKind {
    Collector(SolarCollector),
    Generator(Process),
    Converter(Process),
}

/// Producer cached on a vessel record, keyed by its part.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerRecord {
    pub part: PartId,
    pub kind: ProducerKind,
}

impl ProducerRecord {
    /// Build a producer from a persisted module of the given kind.
    pub fn from_module(
        part: PartId,
        kind: ModuleKind,
        store: &ModuleStateStore,
    ) -> Result<Self, ProducerError> {
        let state_err = |source| ProducerError::State { part, source };
        match kind {
            ModuleKind::SolarPanel => SolarPanelState::from_store(store)
                .map(|state| Self::collector(part, &state))
                .map_err(state_err),
            ModuleKind::Generator => ProcessState::from_store(store)
                .map(|state| Self::generator(part, &state))
                .map_err(state_err),
            ModuleKind::Converter => ProcessState::from_store(store)
                .map(|state| Self::converter(part, &state))
                .map_err(state_err),
            ModuleKind::Engine | ModuleKind::Other => {
                Err(ProducerError::NotAProducer { part, kind })
            }
        }
    }

    pub fn collector(part: PartId, state: &SolarPanelState) -> Self {
        Self {
            part,
            kind: ProducerKind::Collector(SolarCollector {
                deployed: state.deployed,
                charge_rate: state.charge_rate.max(0.0),
                output_resource: state.output_resource.clone(),
                multiplier: state.scale.map(|s| s.multiplier()).unwrap_or(1.0),
            }),
        }
    }

    pub fn generator(part: PartId, state: &ProcessState) -> Self {
        Self {
            part,
            kind: ProducerKind::Generator(Process::from_state(state)),
        }
    }

    pub fn converter(part: PartId, state: &ProcessState) -> Self {
        Self {
            part,
            kind: ProducerKind::Converter(Process::from_state(state)),
        }
    }

    /// Record this producer's changes into the ledger for a tick of `elapsed` seconds.
    ///
    /// `position` is the vessel's absolute position in the orbit frame.
    pub fn simulate(
        &self,
        ledger: &mut ResourceLedger,
        illumination: &Illumination,
        position: &Vector3,
        elapsed: f64,
    ) -> ProducerOutcome {
        let (found_ratio, output_ratio, status) = match &self.kind {
            ProducerKind::Collector(collector) => {
                collector.simulate(ledger, illumination, position, elapsed)
            }
            ProducerKind::Generator(process) | ProducerKind::Converter(process) => {
                process.simulate(ledger, elapsed)
            }
        };
        trace!(part = %self.part, found_ratio, output_ratio, ?status, "producer_simulated");
        ProducerOutcome {
            part: self.part,
            found_ratio,
            output_ratio,
            status,
        }
    }
}

impl SolarCollector {
    fn simulate(
        &self,
        ledger: &mut ResourceLedger,
        illumination: &Illumination,
        position: &Vector3,
        elapsed: f64,
    ) -> (f64, f64, ProducerStatus) {
        if !self.deployed || self.charge_rate <= 0.0 {
            return (1.0, 0.0, ProducerStatus::Inactive);
        }
        let flux = illumination.flux_at(position);
        if flux <= 0.0 {
            return (1.0, 0.0, ProducerStatus::Dark);
        }
        let rate = self.charge_rate * self.multiplier * flux;
        let space = availability(
            ledger.projected_free(&self.output_resource, elapsed),
            rate * elapsed,
        );
        if space <= 0.0 {
            return (1.0, 0.0, ProducerStatus::StorageFull);
        }
        ledger.record_change(&self.output_resource, rate * space);
        (1.0, space, ProducerStatus::Producing)
    }
}

impl Process {
    fn from_state(state: &ProcessState) -> Self {
        Self {
            active: state.active,
            inputs: state.inputs.clone(),
            outputs: state.outputs.clone(),
            dump_excess: state.dump_excess.iter().cloned().collect(),
            multiplier: state.scale.map(|s| s.multiplier()).unwrap_or(1.0),
        }
    }

    fn simulate(&self, ledger: &mut ResourceLedger, elapsed: f64) -> (f64, f64, ProducerStatus) {
        if !self.active {
            return (0.0, 0.0, ProducerStatus::Inactive);
        }
        let found = found_ratio(&self.inputs, self.multiplier, ledger, elapsed);
        if found <= 0.0 {
            return (0.0, 0.0, ProducerStatus::Starved);
        }

        // Scale the whole process to the tightest output bound so inputs are
        // never burned for output that has nowhere to go.
        let mut ratio = found;
        for (resource, rate) in self.outputs.iter() {
            if self.dump_excess.iter().any(|name| name == resource) {
                continue;
            }
            let produced = rate * self.multiplier * ratio * elapsed;
            let space = availability(ledger.projected_free(resource, elapsed), produced);
            ratio *= space;
        }
        let ratio = clamp_unit(ratio);
        if ratio <= 0.0 {
            return (found, 0.0, ProducerStatus::StorageFull);
        }

        for (resource, rate) in self.inputs.iter() {
            ledger.record_change(resource, -rate * self.multiplier * ratio);
        }
        for (resource, rate) in self.outputs.iter() {
            ledger.record_change(resource, rate * self.multiplier * ratio);
        }
        (found, ratio, ProducerStatus::Producing)
    }
}

/// Minimum over inputs of `available / (rate × elapsed)`, clamped to `[0, 1]`.
///
/// A process without inputs always finds what it needs.
pub fn found_ratio(
    inputs: &ResourceManifest,
    multiplier: f64,
    ledger: &ResourceLedger,
    elapsed: f64,
) -> f64 {
    inputs
        .iter()
        .map(|(resource, rate)| {
            let requested = rate * multiplier * elapsed;
            availability(ledger.projected_available(resource, elapsed), requested)
        })
        .fold(1.0, f64::min)
}
