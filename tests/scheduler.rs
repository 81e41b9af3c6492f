use std::collections::BTreeMap;

use persistent_thrust::background::{
    BackgroundScheduler, Body, CacheState, Environment, Fleet, Module, Part, Vessel,
};
use persistent_thrust::config::{ModuleKind, SimulationConfig, Situation, VesselKind};
use persistent_thrust::core::ids::{PartId, VesselId};
use persistent_thrust::orbits::KeplerOrbit;
use persistent_thrust::propulsion::{EngineStatus, SkipReason};
use persistent_thrust::resources::{CompanionResourceProvider, PartStorage, ResourceLibrary};
use persistent_thrust::state::{ModuleStateStore, fields};

const MU: f64 = 3.5316e12;
const ENGINE: PartId = PartId(10);
const TANK: PartId = PartId(11);

fn environment() -> Environment {
    let mut environment = Environment::new(1e-4);
    environment.add_body(Body {
        name: "Kerbin".to_string(),
        mu: MU,
        radius: 600_000.0,
        position: [0.0; 3],
        luminosity: None,
        reference_distance: 1.0,
    });
    environment
}

fn store(entries: &[(&'static str, &str)]) -> ModuleStateStore {
    let mut store = ModuleStateStore::new();
    for (name, value) in entries {
        store.set(name, *value);
    }
    store
}

fn engine_store(throttle: &str) -> ModuleStateStore {
    store(&[
        (fields::THRUST, "20"),
        (fields::ISP, "320"),
        (fields::THROTTLE, throttle),
        (fields::RESOURCE_MANIFEST, "LiquidFuel=0.9;Oxidizer=1.1"),
    ])
}

fn part(id: PartId, modules: Vec<Module>) -> Part {
    Part {
        id,
        name: format!("part-{}", id.0),
        dry_mass_kg: 1_000.0,
        modules,
    }
}

fn bare_vessel(id: u64, kind: VesselKind) -> Vessel {
    let orbit = KeplerOrbit::circular(MU, 700_000.0, 0.0).expect("orbit");
    let mut vessel = Vessel::new(VesselId(id), format!("vessel-{id}"), kind, "Kerbin", orbit);
    vessel.autopilot.set(fields::AUTOPILOT_MODE, "prograde");
    vessel
}

fn tug(id: u64, fuel: f64) -> Vessel {
    let mut vessel = bare_vessel(id, VesselKind::Ship);
    vessel.add_part(
        part(
            ENGINE,
            vec![Module {
                kind: ModuleKind::Engine,
                store: engine_store("1"),
            }],
        ),
        Vec::new(),
    );
    vessel.add_part(
        part(TANK, Vec::new()),
        vec![
            PartStorage::new(TANK, "LiquidFuel", fuel, 100.0),
            PartStorage::new(TANK, "Oxidizer", fuel, 100.0),
        ],
    );
    vessel
}

fn station(id: u64) -> Vessel {
    let mut vessel = bare_vessel(id, VesselKind::Station);
    vessel.add_part(
        part(
            PartId(20),
            vec![Module {
                kind: ModuleKind::Converter,
                store: store(&[
                    (fields::ACTIVE, "true"),
                    (fields::INPUTS, "Ore=1"),
                    (fields::OUTPUTS, "LiquidFuel=0.5"),
                ]),
            }],
        ),
        vec![
            PartStorage::new(PartId(20), "Ore", 50.0, 100.0),
            PartStorage::new(PartId(20), "LiquidFuel", 0.0, 100.0),
        ],
    );
    vessel
}

fn fleet(vessels: impl IntoIterator<Item = Vessel>) -> Fleet {
    let mut fleet = Fleet::new();
    for vessel in vessels {
        fleet.insert(vessel);
    }
    fleet
}

fn scheduler() -> BackgroundScheduler {
    BackgroundScheduler::local(SimulationConfig::default(), ResourceLibrary::stock())
}

fn amount(vessel: &Vessel, resource: &str) -> f64 {
    vessel
        .storage
        .iter()
        .filter(|s| s.resource == resource)
        .map(|s| s.amount)
        .sum()
}

#[test]
fn first_tick_only_builds_records() {
    let env = environment();
    let mut fleet = fleet([tug(1, 100.0)]);
    let mut scheduler = scheduler();

    let report = scheduler.tick(&mut fleet, &env, 10.0);
    assert_eq!(report.candidates, vec![VesselId(1)]);
    assert!(report.advanced.is_none(), "no time has passed for a new record");
    let record = scheduler.record(VesselId(1)).expect("record");
    assert_eq!(record.cache, CacheState::HasActiveEngine);
    assert_eq!(record.engines.len(), 1);
}

#[test]
fn prograde_burn_consumes_propellant_and_raises_orbit() {
    let env = environment();
    let mut fleet = fleet([tug(1, 100.0)]);
    let mut scheduler = scheduler();
    let sma_before = fleet.get(VesselId(1)).expect("tug").orbit.semi_major_axis();

    scheduler.tick(&mut fleet, &env, 0.0);
    let report = scheduler.tick(&mut fleet, &env, 10.0);
    let advance = report.advanced.expect("tug advanced");

    assert_eq!(advance.vessel, VesselId(1));
    assert_eq!(advance.elapsed, 10.0);
    assert!(advance.orbit_changed);
    assert!(advance.delta_v_magnitude() > 0.0);
    assert!(advance.mass_after_kg < advance.mass_before_kg);
    assert_eq!(advance.mean_found_ratio(), Some(1.0));

    let tug = fleet.get(VesselId(1)).expect("tug");
    assert!(tug.orbit.semi_major_axis() > sma_before);
    assert!(amount(tug, "LiquidFuel") < 100.0);
    assert!(amount(tug, "Oxidizer") < 100.0);
    assert_eq!(
        scheduler.record(VesselId(1)).expect("record").last_advanced_ut,
        10.0
    );
}

#[test]
fn consumed_mass_matches_the_rocket_equation() {
    let env = environment();
    let library = ResourceLibrary::stock();
    let mut fleet = fleet([tug(1, 100.0)]);
    let mut scheduler = scheduler();

    scheduler.tick(&mut fleet, &env, 0.0);
    let advance = scheduler.tick(&mut fleet, &env, 10.0).advanced.expect("advance");
    let burned: f64 = advance.engines.iter().map(|e| e.mass_consumed_kg).sum();
    let mass_after = fleet.get(VesselId(1)).expect("tug").total_mass_kg(&library);

    assert!((advance.mass_before_kg - mass_after - burned).abs() < 1e-6);
    let expected = persistent_thrust::propulsion::tsiolkovsky_delta_v(
        320.0,
        advance.mass_before_kg,
        burned,
    );
    assert!((advance.delta_v_magnitude() - expected).abs() < 1e-9);
}

#[test]
fn longest_waiting_vessel_is_advanced_first() {
    let env = environment();
    let mut fleet = fleet([tug(2, 100.0), tug(1, 100.0)]);
    let mut scheduler = scheduler();

    scheduler.tick(&mut fleet, &env, 0.0);
    let order: Vec<(u64, f64)> = [10.0, 20.0, 30.0, 40.0]
        .into_iter()
        .map(|ut| {
            let advance = scheduler.tick(&mut fleet, &env, ut).advanced.expect("advance");
            (advance.vessel.0, advance.elapsed)
        })
        .collect();

    // Equal waits go to the lower id.
    assert_eq!(order, vec![(1, 10.0), (2, 20.0), (1, 20.0), (2, 20.0)]);
}

#[test]
fn vessels_without_active_engines_are_never_advanced() {
    let env = environment();
    let mut fleet = fleet([station(3)]);
    let mut scheduler = scheduler();

    for ut in [0.0, 10.0, 20.0] {
        let report = scheduler.tick(&mut fleet, &env, ut);
        assert_eq!(report.candidates, vec![VesselId(3)]);
        assert!(report.advanced.is_none());
        let record = scheduler.record(VesselId(3)).expect("record");
        assert_eq!(record.cache, CacheState::NoActiveEngine);
        assert_eq!(record.last_advanced_ut, ut, "timestamp rolls forward");
    }
    let station = fleet.get(VesselId(3)).expect("station");
    assert_eq!(amount(station, "Ore"), 50.0, "producers only run during an advance");
}

#[test]
fn inactive_engine_does_not_count() {
    let env = environment();
    let mut vessel = tug(1, 100.0);
    let engine = vessel
        .part_mut(ENGINE)
        .and_then(|p| p.module_mut(ModuleKind::Engine))
        .expect("engine module");
    engine.store.set(fields::ACTIVE, "false");
    let mut fleet = fleet([vessel]);
    let mut scheduler = scheduler();

    scheduler.tick(&mut fleet, &env, 0.0);
    assert_eq!(
        scheduler.record(VesselId(1)).expect("record").cache,
        CacheState::NoActiveEngine
    );
}

#[test]
fn ineligible_vessels_are_skipped() {
    let env = environment();
    let mut landed = tug(2, 100.0);
    landed.situation = Situation::Landed;
    let debris = {
        let mut v = tug(3, 100.0);
        v.kind = VesselKind::Debris;
        v
    };
    let mut active = tug(4, 100.0);
    active.active = true;
    let mut fleet = fleet([tug(1, 100.0), landed, debris, active]);
    let mut scheduler = scheduler();

    let report = scheduler.tick(&mut fleet, &env, 0.0);
    assert_eq!(report.candidates, vec![VesselId(1)]);
    assert_eq!(scheduler.records().count(), 1);
}

#[test]
fn loaded_and_removed_vessels_are_pruned() {
    let env = environment();
    let mut fleet = fleet([tug(1, 100.0), tug(2, 100.0), tug(3, 100.0)]);
    let mut scheduler = scheduler();
    scheduler.tick(&mut fleet, &env, 0.0);
    assert_eq!(scheduler.records().count(), 3);

    fleet.set_active(Some(VesselId(1)));
    fleet.remove(VesselId(2));
    let report = scheduler.tick(&mut fleet, &env, 10.0);

    assert!(scheduler.record(VesselId(1)).is_none());
    assert!(scheduler.record(VesselId(2)).is_none());
    assert_eq!(report.candidates, vec![VesselId(3)]);
    assert_eq!(report.advanced.map(|a| a.vessel), Some(VesselId(3)));
}

#[test]
fn structural_change_rebuilds_the_cache() {
    let env = environment();
    let mut fleet = fleet([tug(1, 100.0)]);
    let mut scheduler = scheduler();
    scheduler.tick(&mut fleet, &env, 0.0);
    assert_eq!(
        scheduler.record(VesselId(1)).expect("record").cache,
        CacheState::HasActiveEngine
    );

    let removed = fleet
        .get_mut(VesselId(1))
        .and_then(|v| v.remove_part(ENGINE))
        .expect("engine part");
    assert_eq!(removed.id, ENGINE);
    let report = scheduler.tick(&mut fleet, &env, 10.0);

    assert!(report.advanced.is_none());
    let record = scheduler.record(VesselId(1)).expect("record");
    assert_eq!(record.cache, CacheState::NoActiveEngine);
    assert!(record.engines.is_empty());
}

#[test]
fn host_signalled_change_is_detected() {
    let env = environment();
    let mut fleet = fleet([tug(1, 100.0)]);
    let mut scheduler = scheduler();
    scheduler.tick(&mut fleet, &env, 0.0);

    let vessel = fleet.get_mut(VesselId(1)).expect("tug");
    vessel
        .part_mut(ENGINE)
        .and_then(|p| p.module_mut(ModuleKind::Engine))
        .expect("engine module")
        .store
        .set(fields::ACTIVE, "false");
    vessel.mark_structure_changed();

    scheduler.tick(&mut fleet, &env, 10.0);
    assert_eq!(
        scheduler.record(VesselId(1)).expect("record").cache,
        CacheState::NoActiveEngine
    );
}

#[test]
fn empty_tanks_report_depletion_without_moving_the_orbit() {
    let env = environment();
    let mut fleet = fleet([tug(1, 0.0)]);
    let mut scheduler = scheduler();
    let orbit_before = fleet.get(VesselId(1)).expect("tug").orbit.clone();

    scheduler.tick(&mut fleet, &env, 0.0);
    let advance = scheduler.tick(&mut fleet, &env, 10.0).advanced.expect("advance");

    assert_eq!(advance.depleted, vec![ENGINE]);
    assert!(!advance.orbit_changed);
    assert_eq!(advance.delta_v_magnitude(), 0.0);
    assert_eq!(fleet.get(VesselId(1)).expect("tug").orbit, orbit_before);
}

#[test]
fn background_result_is_written_to_the_engine_module() {
    let env = environment();
    let mut fleet = fleet([tug(1, 100.0)]);
    let mut scheduler = scheduler();
    scheduler.tick(&mut fleet, &env, 0.0);
    scheduler.tick(&mut fleet, &env, 10.0);

    let module = fleet
        .get(VesselId(1))
        .and_then(|v| v.part(ENGINE))
        .and_then(|p| p.module(ModuleKind::Engine))
        .expect("engine module");
    assert_eq!(module.store.get(fields::LAST_FOUND_RATIO), Some("1"));
    assert_eq!(module.store.get(fields::LAST_BACKGROUND_UT), Some("10"));
}

#[test]
fn unreadable_engine_state_is_skipped() {
    let env = environment();
    let mut fleet = fleet([tug(1, 100.0)]);
    let mut scheduler = scheduler();
    scheduler.tick(&mut fleet, &env, 0.0);

    fleet
        .get_mut(VesselId(1))
        .and_then(|v| v.part_mut(ENGINE))
        .and_then(|p| p.module_mut(ModuleKind::Engine))
        .expect("engine module")
        .store
        .set(fields::THROTTLE, "full");

    let advance = scheduler.tick(&mut fleet, &env, 10.0).advanced.expect("advance");
    assert!(advance.engines.is_empty());
    assert!(!advance.orbit_changed);
    assert_eq!(amount(fleet.get(VesselId(1)).expect("tug"), "LiquidFuel"), 100.0);
}

#[test]
fn malformed_engine_is_left_out_of_discovery() {
    let env = environment();
    let mut vessel = tug(1, 100.0);
    vessel.add_part(
        part(
            PartId(12),
            vec![Module {
                kind: ModuleKind::Engine,
                store: store(&[(fields::THRUST, "20"), (fields::ISP, "320")]),
            }],
        ),
        Vec::new(),
    );
    let mut fleet = fleet([vessel]);
    let mut scheduler = scheduler();
    scheduler.tick(&mut fleet, &env, 0.0);

    let record = scheduler.record(VesselId(1)).expect("record");
    assert_eq!(record.cache, CacheState::HasActiveEngine);
    assert_eq!(record.engines.keys().copied().collect::<Vec<_>>(), vec![ENGINE]);
}

#[test]
fn producers_run_before_engines_draw() {
    let env = environment();
    let mut vessel = tug(1, 100.0);
    vessel.add_part(
        part(
            PartId(13),
            vec![Module {
                kind: ModuleKind::Generator,
                store: store(&[
                    (fields::ACTIVE, "true"),
                    (fields::OUTPUTS, "ElectricCharge=1"),
                ]),
            }],
        ),
        vec![PartStorage::new(PartId(13), "ElectricCharge", 0.0, 100.0)],
    );
    let mut fleet = fleet([vessel]);
    let mut scheduler = scheduler();
    scheduler.tick(&mut fleet, &env, 0.0);
    let advance = scheduler.tick(&mut fleet, &env, 10.0).advanced.expect("advance");

    assert_eq!(advance.producers.len(), 1);
    let charge = amount(fleet.get(VesselId(1)).expect("tug"), "ElectricCharge");
    assert!((charge - 10.0).abs() < 1e-9, "charge {charge}");
}

#[test]
fn fixed_facing_vessel_does_not_thrust_off_heading() {
    let env = environment();
    let config = SimulationConfig {
        autopilot_reorients: false,
        ..SimulationConfig::default()
    };
    let mut vessel = tug(1, 100.0);
    vessel.facing = [1.0, 0.0, 0.0];
    let mut fleet = fleet([vessel]);
    let mut scheduler = BackgroundScheduler::local(config, ResourceLibrary::stock());

    scheduler.tick(&mut fleet, &env, 0.0);
    let advance = scheduler.tick(&mut fleet, &env, 10.0).advanced.expect("advance");
    assert!(!advance.orbit_changed);
    assert_eq!(amount(fleet.get(VesselId(1)).expect("tug"), "LiquidFuel"), 100.0);
}

#[test]
fn persisted_misalignment_survives_reorientation() {
    let env = environment();
    let mut vessel = tug(1, 100.0);
    vessel.facing = [1.0, 0.0, 0.0];
    vessel
        .part_mut(ENGINE)
        .and_then(|p| p.module_mut(ModuleKind::Engine))
        .expect("engine module")
        .store
        .set(fields::HEADING_ALIGNMENT, "0.1");
    let mut fleet = fleet([vessel]);
    let mut scheduler = scheduler();
    assert!(scheduler.config().autopilot_reorients);

    scheduler.tick(&mut fleet, &env, 0.0);
    let advance = scheduler.tick(&mut fleet, &env, 10.0).advanced.expect("advance");
    assert_eq!(
        advance.engines[0].status,
        EngineStatus::Skipped(SkipReason::Misaligned)
    );
    assert!(!advance.orbit_changed);
    assert_eq!(amount(fleet.get(VesselId(1)).expect("tug"), "LiquidFuel"), 100.0);
}

#[test]
fn stability_assist_burns_along_facing() {
    let env = environment();
    let mut vessel = tug(1, 100.0);
    vessel.autopilot.set(fields::AUTOPILOT_MODE, "stability_assist");
    vessel.facing = [0.0, 1.0, 0.0];
    let mut fleet = fleet([vessel]);
    let mut scheduler = scheduler();

    scheduler.tick(&mut fleet, &env, 0.0);
    let advance = scheduler.tick(&mut fleet, &env, 10.0).advanced.expect("advance");
    assert_eq!(advance.heading, [0.0, 1.0, 0.0]);
    assert!(advance.delta_v[1] > 0.0);
    assert_eq!(advance.delta_v[0], 0.0);
}

#[test]
fn unknown_target_leaves_the_vessel_coasting() {
    let env = environment();
    let mut vessel = tug(1, 100.0);
    vessel.autopilot.set(fields::AUTOPILOT_MODE, "target");
    vessel.autopilot.set(fields::TARGET, "vessel:99");
    let mut fleet = fleet([vessel]);
    let mut scheduler = scheduler();

    scheduler.tick(&mut fleet, &env, 0.0);
    let advance = scheduler.tick(&mut fleet, &env, 10.0).advanced.expect("advance");
    assert_eq!(advance.heading, [0.0; 3]);
    assert!(!advance.orbit_changed);
}

#[test]
fn companion_provider_queues_requests_instead_of_draining_parts() {
    let env = environment();
    let mut fleet = fleet([tug(1, 100.0)]);
    let mut provider = CompanionResourceProvider::new();
    provider.publish_available(
        VesselId(1),
        BTreeMap::from([
            ("LiquidFuel".to_string(), (500.0, 500.0)),
            ("Oxidizer".to_string(), (500.0, 500.0)),
        ]),
    );
    let mut scheduler =
        BackgroundScheduler::new(SimulationConfig::default(), ResourceLibrary::stock(), provider);

    scheduler.tick(&mut fleet, &env, 0.0);
    let advance = scheduler.tick(&mut fleet, &env, 10.0).advanced.expect("advance");
    assert!(advance.orbit_changed);

    let tug = fleet.get(VesselId(1)).expect("tug");
    assert_eq!(amount(tug, "LiquidFuel"), 100.0, "part storage is untouched");
    let requests = scheduler.provider_mut().drain_requests();
    let fuel = requests
        .iter()
        .find(|r| r.resource == "LiquidFuel")
        .expect("fuel request");
    assert_eq!(fuel.vessel, VesselId(1));
    assert!(fuel.per_second < 0.0);
    assert_eq!(fuel.elapsed, 10.0);
    assert!(scheduler.provider().pending_requests().is_empty());
}

#[test]
fn companion_totals_with_bad_maximum_do_not_panic() {
    let env = environment();
    let mut fleet = fleet([tug(1, 100.0)]);
    let mut provider = CompanionResourceProvider::new();
    provider.publish_available(
        VesselId(1),
        BTreeMap::from([
            ("LiquidFuel".to_string(), (0.0, -1.0)),
            ("Oxidizer".to_string(), (f64::NAN, f64::NAN)),
        ]),
    );
    let mut scheduler =
        BackgroundScheduler::new(SimulationConfig::default(), ResourceLibrary::stock(), provider);

    scheduler.tick(&mut fleet, &env, 0.0);
    let advance = scheduler.tick(&mut fleet, &env, 10.0).advanced.expect("advance");
    assert_eq!(advance.depleted, vec![ENGINE]);
    assert!(!advance.orbit_changed);
    let report = scheduler.tick(&mut fleet, &env, 20.0);
    assert!(report.advanced.is_some());
}

#[test]
fn reset_forgets_every_record() {
    let env = environment();
    let mut fleet = fleet([tug(1, 100.0), station(2)]);
    let mut scheduler = scheduler();
    scheduler.tick(&mut fleet, &env, 0.0);
    assert_eq!(scheduler.records().count(), 2);

    scheduler.reset();
    assert_eq!(scheduler.records().count(), 0);
    let report = scheduler.tick(&mut fleet, &env, 100.0);
    assert!(report.advanced.is_none(), "rebuilt records start from the current time");
}
