//! Host-side vessel model the scheduler reads and mutates.
//!
//! This is the minimal surface the background simulation needs from a game
//! host: vessels with stable ids, parts carrying name-keyed module stores,
//! part storage, a conic orbit, and static celestial bodies.

use std::collections::BTreeMap;

use pt_config::{BodyConfig, ModuleKind, Situation, VesselConfig, VesselKind};
use pt_core::ids::{PartId, VesselId};
use pt_core::units::tonnes_to_kg;
use pt_core::vector::{self, Vector3, ZERO};
use pt_orbits::{KeplerOrbit, Orbit};
use pt_producers::{Illumination, LightSource, Occluder};
use pt_resources::{PartStorage, ResourceLibrary};
use pt_state::ModuleStateStore;

use crate::FleetError;

/// Distance at which a light source with luminosity 1.0 delivers nominal flux
/// when the body does not specify one.
pub const DEFAULT_REFERENCE_DISTANCE_M: f64 = 13_599_840_256.0;

#[derive(Debug, Clone)]
pub struct Module {
    pub kind: ModuleKind,
    pub store: ModuleStateStore,
}

#[derive(Debug, Clone)]
pub struct Part {
    pub id: PartId,
    pub name: String,
    pub dry_mass_kg: f64,
    pub modules: Vec<Module>,
}

impl Part {
    /// First module of `kind` on this part.
    pub fn module(&self, kind: ModuleKind) -> Option<&Module> {
        self.modules.iter().find(|m| m.kind == kind)
    }

    pub fn module_mut(&mut self, kind: ModuleKind) -> Option<&mut Module> {
        self.modules.iter_mut().find(|m| m.kind == kind)
    }
}

#[derive(Debug, Clone)]
pub struct Vessel {
    pub id: VesselId,
    pub name: String,
    pub kind: VesselKind,
    pub situation: Situation,
    /// Loaded under full physics; never advanced in the background.
    pub active: bool,
    /// Facing in the vessel (y-up) frame.
    pub facing: Vector3,
    pub body: String,
    pub orbit: KeplerOrbit,
    pub autopilot: ModuleStateStore,
    pub parts: Vec<Part>,
    pub storage: Vec<PartStorage>,
    revision: u64,
}

impl Vessel {
    pub fn new(
        id: VesselId,
        name: impl Into<String>,
        kind: VesselKind,
        body: impl Into<String>,
        orbit: KeplerOrbit,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            situation: Situation::Orbiting,
            active: false,
            facing: [0.0, 1.0, 0.0],
            body: body.into(),
            orbit,
            autopilot: ModuleStateStore::new(),
            parts: Vec::new(),
            storage: Vec::new(),
            revision: 0,
        }
    }

    /// Structure revision; changes whenever parts are added or removed.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Signal a structural change the host made outside [`Vessel::add_part`] and [`Vessel::remove_part`].
    pub fn mark_structure_changed(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn add_part(&mut self, part: Part, storage: impl IntoIterator<Item = PartStorage>) {
        let id = part.id;
        self.parts.push(part);
        self.storage
            .extend(storage.into_iter().map(|mut s| {
                s.part = id;
                s
            }));
        self.mark_structure_changed();
    }

    /// Detach a part and its storage. Returns the part if it existed.
    pub fn remove_part(&mut self, id: PartId) -> Option<Part> {
        let index = self.parts.iter().position(|p| p.id == id)?;
        let part = self.parts.remove(index);
        self.storage.retain(|s| s.part != id);
        self.mark_structure_changed();
        Some(part)
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.iter().find(|p| p.id == id)
    }

    pub fn part_mut(&mut self, id: PartId) -> Option<&mut Part> {
        self.parts.iter_mut().find(|p| p.id == id)
    }

    pub fn has_part(&self, id: PartId) -> bool {
        self.parts.iter().any(|p| p.id == id)
    }

    /// Dry mass plus the mass of every stored resource, in kilograms.
    pub fn total_mass_kg(&self, library: &ResourceLibrary) -> f64 {
        let dry: f64 = self.parts.iter().map(|p| p.dry_mass_kg.max(0.0)).sum();
        let wet: f64 = self.storage.iter().map(|s| s.mass_kg(library)).sum();
        dry + wet
    }

    /// Whether the background simulation should consider this vessel at all.
    pub fn is_background_candidate(&self) -> bool {
        !self.active && self.kind.is_physical_craft() && self.situation.is_on_trajectory()
    }

    /// Absolute position in the orbit frame.
    pub fn absolute_position(&self, environment: &Environment, ut: f64) -> Vector3 {
        vector::add(
            &environment.body_position(&self.body),
            &self.orbit.position_at(ut),
        )
    }

    pub fn from_config(config: &VesselConfig, environment: &Environment) -> Result<Self, FleetError> {
        let id = VesselId(config.id);
        let body = environment
            .body(&config.orbit.body)
            .ok_or_else(|| FleetError::UnknownBody {
                vessel: id,
                body: config.orbit.body.clone(),
            })?;
        let orbit = KeplerOrbit::from_state_vectors(
            body.mu,
            config.orbit.position_m,
            config.orbit.velocity_m_s,
            config.orbit.epoch_s,
        )
        .map_err(|source| FleetError::Orbit { vessel: id, source })?;

        let mut vessel = Vessel::new(id, config.name.clone(), config.kind, body.name.clone(), orbit);
        vessel.situation = config.situation;
        vessel.active = config.active;
        vessel.facing = config.facing;
        vessel.autopilot = ModuleStateStore::from(config.autopilot.clone());

        for part in &config.parts {
            let part_id = PartId(part.id);
            if vessel.has_part(part_id) {
                return Err(FleetError::DuplicatePart {
                    vessel: id,
                    part: part_id,
                });
            }
            let storage: Vec<PartStorage> = part
                .resources
                .iter()
                .map(|s| {
                    let storage = PartStorage::new(part_id, s.resource.clone(), s.amount, s.max_amount);
                    if s.locked { storage.locked() } else { storage }
                })
                .collect();
            vessel.add_part(
                Part {
                    id: part_id,
                    name: part.name.clone(),
                    dry_mass_kg: tonnes_to_kg(part.dry_mass_t),
                    modules: part
                        .modules
                        .iter()
                        .map(|m| Module {
                            kind: m.kind,
                            store: ModuleStateStore::from(m.fields.clone()),
                        })
                        .collect(),
                },
                storage,
            );
        }
        Ok(vessel)
    }
}

/// Every vessel known to the host, keyed by persistent id.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    vessels: BTreeMap<VesselId, Vessel>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_configs(
        configs: &[VesselConfig],
        environment: &Environment,
    ) -> Result<Self, FleetError> {
        let mut fleet = Self::new();
        for config in configs {
            let vessel = Vessel::from_config(config, environment)?;
            if fleet.vessels.contains_key(&vessel.id) {
                return Err(FleetError::DuplicateVessel(vessel.id));
            }
            fleet.insert(vessel);
        }
        Ok(fleet)
    }

    pub fn insert(&mut self, vessel: Vessel) -> Option<Vessel> {
        self.vessels.insert(vessel.id, vessel)
    }

    pub fn remove(&mut self, id: VesselId) -> Option<Vessel> {
        self.vessels.remove(&id)
    }

    pub fn get(&self, id: VesselId) -> Option<&Vessel> {
        self.vessels.get(&id)
    }

    pub fn get_mut(&mut self, id: VesselId) -> Option<&mut Vessel> {
        self.vessels.get_mut(&id)
    }

    pub fn contains(&self, id: VesselId) -> bool {
        self.vessels.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = VesselId> + '_ {
        self.vessels.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vessel> {
        self.vessels.values()
    }

    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }

    /// Make `id` the single loaded vessel. Passing `None` unloads everything.
    pub fn set_active(&mut self, id: Option<VesselId>) {
        for vessel in self.vessels.values_mut() {
            vessel.active = Some(vessel.id) == id;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub name: String,
    pub mu: f64,
    pub radius: f64,
    /// Fixed position in the orbit frame.
    pub position: Vector3,
    pub luminosity: Option<f64>,
    pub reference_distance: f64,
}

/// Static celestial bodies and the illumination they produce.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bodies: BTreeMap<String, Body>,
    illumination: Illumination,
}

impl Environment {
    pub fn new(negligible_flux: f64) -> Self {
        Self {
            bodies: BTreeMap::new(),
            illumination: Illumination::new(negligible_flux),
        }
    }

    pub fn from_configs(configs: &[BodyConfig], negligible_flux: f64) -> Result<Self, FleetError> {
        let mut environment = Self::new(negligible_flux);
        for config in configs {
            if environment.bodies.contains_key(&config.name) {
                return Err(FleetError::DuplicateBody(config.name.clone()));
            }
            if config.mu_m3_s2 <= 0.0 || !config.mu_m3_s2.is_finite() {
                return Err(FleetError::InvalidBody {
                    body: config.name.clone(),
                    reason: format!("gravitational parameter {}", config.mu_m3_s2),
                });
            }
            environment.add_body(Body {
                name: config.name.clone(),
                mu: config.mu_m3_s2,
                radius: config.radius_m.max(0.0),
                position: config.position_m,
                luminosity: config.luminosity,
                reference_distance: config
                    .reference_distance_m
                    .unwrap_or(DEFAULT_REFERENCE_DISTANCE_M),
            });
        }
        Ok(environment)
    }

    pub fn add_body(&mut self, body: Body) {
        self.illumination.occluders.retain(|o| o.name != body.name);
        self.illumination.sources.retain(|s| s.name != body.name);
        self.illumination.occluders.push(Occluder {
            name: body.name.clone(),
            position: body.position,
            radius: body.radius,
        });
        if let Some(luminosity) = body.luminosity.filter(|l| *l > 0.0) {
            self.illumination.sources.push(LightSource {
                name: body.name.clone(),
                position: body.position,
                luminosity,
                reference_distance: body.reference_distance,
            });
        }
        self.bodies.insert(body.name.clone(), body);
    }

    pub fn body(&self, name: &str) -> Option<&Body> {
        self.bodies.get(name)
    }

    /// Orbit-frame position of a body, or the origin when it is unknown.
    pub fn body_position(&self, name: &str) -> Vector3 {
        self.bodies.get(name).map(|b| b.position).unwrap_or(ZERO)
    }

    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.values()
    }

    pub fn illumination(&self) -> &Illumination {
        &self.illumination
    }
}
