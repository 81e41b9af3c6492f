//! Per-vessel cache of engines, producers, and the resource ledger.

use std::collections::{BTreeMap, BTreeSet};

use pt_config::{ModuleKind, SimulationConfig};
use pt_core::ids::{PartId, VesselId};
use pt_producers::ProducerRecord;
use pt_propulsion::{EngineRecord, PropulsionError};
use pt_resources::{ResourceLedger, ResourceLibrary};
use pt_state::EngineModuleState;
use tracing::{debug, warn};

use crate::fleet::Vessel;

/// Discovery state of a vessel's module cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    NoActiveEngine,
    HasActiveEngine,
}

#[derive(Debug, Clone)]
pub struct VesselRecord {
    pub id: VesselId,
    pub cache: CacheState,
    /// Universal time up to which this vessel has been simulated.
    pub last_advanced_ut: f64,
    pub ledger: ResourceLedger,
    pub engines: BTreeMap<PartId, EngineRecord>,
    pub producers: BTreeMap<PartId, Vec<ProducerRecord>>,
    /// Total mass at the most recent snapshot, in kilograms.
    pub mass_kg: f64,
    revision: Option<u64>,
    warned_parts: BTreeSet<PartId>,
    warned_autopilot: bool,
}

impl VesselRecord {
    pub fn new(id: VesselId, ut: f64, config: &SimulationConfig) -> Self {
        Self {
            id,
            cache: CacheState::Uninitialized,
            last_advanced_ut: ut,
            ledger: ResourceLedger::new(config.resource_epsilon),
            engines: BTreeMap::new(),
            producers: BTreeMap::new(),
            mass_kg: 0.0,
            revision: None,
            warned_parts: BTreeSet::new(),
            warned_autopilot: false,
        }
    }

    /// Seconds of simulation owed at `ut`.
    pub fn elapsed(&self, ut: f64) -> f64 {
        (ut - self.last_advanced_ut).max(0.0)
    }

    /// The cache no longer describes the vessel's parts.
    pub fn is_stale(&self, vessel: &Vessel) -> bool {
        if self.cache == CacheState::Uninitialized {
            return false;
        }
        self.revision != Some(vessel.revision())
            || self
                .engines
                .keys()
                .chain(self.producers.keys())
                .any(|part| !vessel.has_part(*part))
    }

    pub fn invalidate(&mut self) {
        self.cache = CacheState::Uninitialized;
        self.engines.clear();
        self.producers.clear();
        self.revision = None;
    }

    /// Rebuild engine and producer caches from the vessel's modules.
    pub fn discover(
        &mut self,
        vessel: &Vessel,
        library: &ResourceLibrary,
        config: &SimulationConfig,
    ) -> CacheState {
        self.engines.clear();
        self.producers.clear();
        self.warned_parts.clear();
        self.warned_autopilot = false;

        for part in &vessel.parts {
            for module in &part.modules {
                match module.kind {
                    ModuleKind::Engine => {
                        if self.engines.contains_key(&part.id) {
                            debug!(vessel = %self.id, part = %part.id, "extra_engine_module_ignored");
                            continue;
                        }
                        let built = EngineModuleState::from_store(&module.store)
                            .map_err(|source| PropulsionError::State {
                                part: part.id,
                                source,
                            })
                            .and_then(|state| {
                                EngineRecord::from_state(part.id, &state, library, config)
                            });
                        match built {
                            Ok(engine) => {
                                self.engines.insert(part.id, engine);
                            }
                            Err(error) => self.warn_part(part.id, &error),
                        }
                    }
                    ModuleKind::SolarPanel | ModuleKind::Generator | ModuleKind::Converter => {
                        match ProducerRecord::from_module(part.id, module.kind, &module.store) {
                            Ok(producer) => {
                                self.producers.entry(part.id).or_default().push(producer)
                            }
                            Err(error) => self.warn_part(part.id, &error),
                        }
                    }
                    ModuleKind::Other => {}
                }
            }
        }

        self.revision = Some(vessel.revision());
        self.cache = if self.engines.values().any(|e| e.active) {
            CacheState::HasActiveEngine
        } else {
            CacheState::NoActiveEngine
        };
        debug!(
            vessel = %self.id,
            engines = self.engines.len(),
            producers = self.producers.values().map(Vec::len).sum::<usize>(),
            cache = ?self.cache,
            "vessel_cache_discovered"
        );
        self.cache
    }

    /// Log a module problem once per part until the cache is rebuilt.
    pub(crate) fn warn_part(&mut self, part: PartId, error: &dyn std::error::Error) {
        if self.warned_parts.insert(part) {
            warn!(vessel = %self.id, part = %part, error = %error, "module_state_unusable");
        }
    }

    pub(crate) fn warn_autopilot(&mut self, error: &dyn std::error::Error) {
        if !self.warned_autopilot {
            self.warned_autopilot = true;
            warn!(vessel = %self.id, error = %error, "autopilot_state_unusable");
        }
    }
}
