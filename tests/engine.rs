use persistent_thrust::config::SimulationConfig;
use persistent_thrust::core::constants::G0;
use persistent_thrust::core::ids::PartId;
use persistent_thrust::core::vector;
use persistent_thrust::propulsion::{
    BurnContext, EngineRecord, EngineStatus, PropulsionError, SkipReason, mass_flow_rate,
    tsiolkovsky_delta_v,
};
use persistent_thrust::resources::{PartStorage, ResourceLedger, ResourceLibrary};
use persistent_thrust::state::{EngineModuleState, ResourceManifest};
use proptest::prelude::*;

const UP: [f64; 3] = [0.0, 1.0, 0.0];

fn engine_state(thrust_kn: f64, isp_s: f64, throttle: f64, manifest: &str) -> EngineModuleState {
    EngineModuleState {
        thrust_kn,
        isp_s,
        throttle,
        heading_alignment: None,
        manifest: manifest.parse().expect("manifest"),
        active: true,
    }
}

fn ledger_with(parts: &[PartStorage]) -> ResourceLedger {
    let mut ledger = ResourceLedger::default();
    ledger.refresh(parts);
    ledger
}

fn context(config: &SimulationConfig, mass_kg: f64, elapsed: f64) -> BurnContext<'_> {
    BurnContext {
        heading: UP,
        facing: UP,
        vessel_mass_kg: mass_kg,
        elapsed,
        config,
    }
}

#[test]
fn rocket_equation_reference_burn() {
    // 1 kN at 300 s for 10 s on a 1000 kg vessel.
    let flow = mass_flow_rate(1_000.0, 300.0);
    let burned = flow * 10.0;
    let dv = tsiolkovsky_delta_v(300.0, 1_000.0, burned);
    let expected = 300.0 * G0 * (1_000.0f64 / (1_000.0 - burned)).ln();
    assert!((dv - expected).abs() / expected < 0.01);
    assert!((dv - 10.0).abs() < 0.1, "dv {dv}");
}

#[test]
fn rocket_helpers_guard_degenerate_input() {
    assert_eq!(mass_flow_rate(1_000.0, 0.0), 0.0);
    assert_eq!(mass_flow_rate(-5.0, 300.0), 0.0);
    assert_eq!(tsiolkovsky_delta_v(300.0, 1_000.0, 0.0), 0.0);
    assert_eq!(tsiolkovsky_delta_v(300.0, 1_000.0, 1_000.0), 0.0);
}

#[test]
fn warp_burn_matches_tsiolkovsky_and_draws_propellant() {
    let config = SimulationConfig::default();
    let library = ResourceLibrary::stock();
    let mut engine = EngineRecord::from_state(
        PartId(1),
        &engine_state(1.0, 300.0, 1.0, "LiquidFuel=0.9;Oxidizer=1.1"),
        &library,
        &config,
    )
    .expect("engine");

    let mut parts = vec![
        PartStorage::new(PartId(2), "LiquidFuel", 100.0, 100.0),
        PartStorage::new(PartId(2), "Oxidizer", 100.0, 100.0),
    ];
    let mut ledger = ledger_with(&parts);
    let tick = engine.advance(&mut ledger, &context(&config, 1_000.0, 10.0));

    assert_eq!(tick.status, EngineStatus::Burning);
    assert_eq!(tick.found_ratio, 1.0);
    let dv = tick.delta_v_magnitude();
    let expected = tsiolkovsky_delta_v(300.0, 1_000.0, mass_flow_rate(1_000.0, 300.0) * 10.0);
    assert!((dv - expected).abs() / expected < 0.01, "dv {dv} expected {expected}");
    assert!((tick.delta_v[1] - dv).abs() < 1e-9, "delta-v follows the heading");

    ledger.commit(&mut parts, 10.0);
    let consumed_kg: f64 = parts.iter().map(|s| (100.0 - s.amount) * 5.0).sum();
    assert!((consumed_kg - tick.mass_consumed_kg).abs() < 1e-6);
}

#[test]
fn normalized_ratios_are_mass_fractions() {
    let config = SimulationConfig::default();
    let engine = EngineRecord::from_state(
        PartId(1),
        &engine_state(2.0, 4200.0, 1.0, "XenonGas=0.1;ElectricCharge=1.8"),
        &ResourceLibrary::stock(),
        &config,
    )
    .expect("engine");

    let mass_sum: f64 = engine
        .propellants
        .iter()
        .filter(|p| !p.massless)
        .map(|p| p.normalized_ratio)
        .sum();
    assert!((mass_sum - 1.0).abs() < 1e-12);
    let charge = engine
        .propellants
        .iter()
        .find(|p| p.resource == "ElectricCharge")
        .expect("electric charge");
    assert!(charge.massless);
    assert_eq!(charge.normalized_ratio, 0.0);
}

#[test]
fn massless_propellant_scales_with_mixture_ratio() {
    let config = SimulationConfig::default();
    let mut engine = EngineRecord::from_state(
        PartId(1),
        &engine_state(2.0, 4200.0, 1.0, "XenonGas=0.1;ElectricCharge=1.8"),
        &ResourceLibrary::stock(),
        &config,
    )
    .expect("engine");
    let parts = vec![
        PartStorage::new(PartId(2), "XenonGas", 500.0, 500.0),
        PartStorage::new(PartId(3), "ElectricCharge", 1_000.0, 1_000.0),
    ];
    let mut ledger = ledger_with(&parts);
    engine.advance(&mut ledger, &context(&config, 1_000.0, 10.0));

    let xenon = &engine.propellants[0];
    let charge = &engine.propellants[1];
    assert!((charge.requested / xenon.requested - 18.0).abs() < 1e-9);
}

#[test]
fn partial_availability_limits_thrust() {
    let config = SimulationConfig::default();
    let mut engine = EngineRecord::from_state(
        PartId(1),
        &engine_state(2.0, 4200.0, 1.0, "XenonGas=0.1;ElectricCharge=1.8"),
        &ResourceLibrary::stock(),
        &config,
    )
    .expect("engine");
    // The burn wants about 8.7 EC/s; only a quarter of that is on board for 10 s.
    let parts = vec![
        PartStorage::new(PartId(2), "XenonGas", 500.0, 500.0),
        PartStorage::new(PartId(3), "ElectricCharge", 21.85, 100.0),
    ];
    let mut ledger = ledger_with(&parts);
    let tick = engine.advance(&mut ledger, &context(&config, 1_000.0, 10.0));

    assert_eq!(tick.status, EngineStatus::Burning);
    assert!(tick.found_ratio > 0.2 && tick.found_ratio < 0.3, "found {}", tick.found_ratio);
    assert!(tick.effective_thrust_n <= 2_000.0 * tick.found_ratio + 1e-9);
}

#[test]
fn empty_tank_reports_depletion() {
    let config = SimulationConfig::default();
    let mut engine = EngineRecord::from_state(
        PartId(1),
        &engine_state(60.0, 800.0, 1.0, "LiquidFuel=1"),
        &ResourceLibrary::stock(),
        &config,
    )
    .expect("engine");
    let parts = vec![PartStorage::new(PartId(2), "LiquidFuel", 0.0, 100.0)];
    let mut ledger = ledger_with(&parts);
    let tick = engine.advance(&mut ledger, &context(&config, 5_000.0, 10.0));

    assert_eq!(tick.status, EngineStatus::Depleted);
    assert_eq!(tick.found_ratio, 0.0);
    assert_eq!(tick.effective_thrust_n, 0.0);
    assert!(vector::is_zero(&tick.delta_v));
    assert_eq!(ledger.pending("LiquidFuel"), 0.0, "nothing is withdrawn");
}

#[test]
fn infinite_propellant_ignores_empty_tanks() {
    let config = SimulationConfig {
        infinite_propellant: true,
        ..SimulationConfig::default()
    };
    let mut engine = EngineRecord::from_state(
        PartId(1),
        &engine_state(60.0, 800.0, 1.0, "LiquidFuel=1"),
        &ResourceLibrary::stock(),
        &config,
    )
    .expect("engine");
    let mut ledger = ledger_with(&[PartStorage::new(PartId(2), "LiquidFuel", 0.0, 100.0)]);
    let tick = engine.advance(&mut ledger, &context(&config, 5_000.0, 10.0));

    assert_eq!(tick.status, EngineStatus::Burning);
    assert!(tick.delta_v_magnitude() > 0.0);
    assert_eq!(tick.mass_consumed_kg, 0.0);
    assert_eq!(ledger.pending("LiquidFuel"), 0.0);
}

#[test]
fn preconditions_skip_the_engine() {
    let config = SimulationConfig::default();
    let library = ResourceLibrary::stock();
    let parts = vec![PartStorage::new(PartId(2), "LiquidFuel", 100.0, 100.0)];

    let mut idle = EngineRecord::from_state(
        PartId(1),
        &engine_state(60.0, 800.0, 0.0, "LiquidFuel=1"),
        &library,
        &config,
    )
    .expect("engine");
    let tick = idle.advance(&mut ledger_with(&parts), &context(&config, 5_000.0, 10.0));
    assert_eq!(tick.status, EngineStatus::Skipped(SkipReason::Idle));

    let mut no_thrust = EngineRecord::from_state(
        PartId(1),
        &engine_state(0.0, 800.0, 1.0, "LiquidFuel=1"),
        &library,
        &config,
    )
    .expect("engine");
    let tick = no_thrust.advance(&mut ledger_with(&parts), &context(&config, 5_000.0, 10.0));
    assert_eq!(tick.status, EngineStatus::Skipped(SkipReason::NoThrust));

    let mut engine = EngineRecord::from_state(
        PartId(1),
        &engine_state(60.0, 800.0, 1.0, "LiquidFuel=1"),
        &library,
        &config,
    )
    .expect("engine");
    let mut ctx = context(&config, 5_000.0, 10.0);
    ctx.heading = [0.0; 3];
    let tick = engine.advance(&mut ledger_with(&parts), &ctx);
    assert_eq!(tick.status, EngineStatus::Skipped(SkipReason::NoHeading));

    let mut ctx = context(&config, 5_000.0, 10.0);
    ctx.facing = [0.2, 1.0, 0.0];
    let tick = engine.advance(&mut ledger_with(&parts), &ctx);
    assert_eq!(
        tick.status,
        EngineStatus::Skipped(SkipReason::Misaligned),
        "dot of about 0.98 falls below tolerance"
    );

    let mut ctx = context(&config, 5_000.0, 10.0);
    ctx.facing = [0.05, 1.0, 0.0];
    let tick = engine.advance(&mut ledger_with(&parts), &ctx);
    assert_eq!(tick.status, EngineStatus::Burning);
}

#[test]
fn burn_never_drops_mass_below_floor() {
    let config = SimulationConfig {
        min_remaining_mass_kg: 100.0,
        ..SimulationConfig::default()
    };
    let mut engine = EngineRecord::from_state(
        PartId(1),
        &engine_state(600.0, 300.0, 1.0, "LiquidFuel=1"),
        &ResourceLibrary::stock(),
        &config,
    )
    .expect("engine");
    let mut ledger = ledger_with(&[PartStorage::new(PartId(2), "LiquidFuel", 1.0e6, 1.0e6)]);
    let tick = engine.advance(&mut ledger, &context(&config, 150.0, 100.0));
    assert!(tick.mass_consumed_kg <= 50.0 + 1e-9);
    assert!(tick.delta_v_magnitude().is_finite());

    let fuel = &engine.propellants[0];
    let drawn_kg = fuel.committed * fuel.density_kg;
    assert!(
        (drawn_kg - tick.mass_consumed_kg).abs() < 1e-9,
        "drew {drawn_kg} kg but burned {} kg",
        tick.mass_consumed_kg
    );
    assert!((ledger.pending("LiquidFuel") * 100.0 + fuel.committed).abs() < 1e-9);
}

#[test]
fn persisted_alignment_score_blocks_thrust() {
    let config = SimulationConfig::default();
    let parts = vec![PartStorage::new(PartId(2), "LiquidFuel", 100.0, 100.0)];
    let state = EngineModuleState {
        heading_alignment: Some(0.1),
        ..engine_state(60.0, 800.0, 1.0, "LiquidFuel=1")
    };
    let mut engine =
        EngineRecord::from_state(PartId(1), &state, &ResourceLibrary::stock(), &config)
            .expect("engine");

    let mut ledger = ledger_with(&parts);
    let tick = engine.advance(&mut ledger, &context(&config, 5_000.0, 10.0));
    assert_eq!(tick.status, EngineStatus::Skipped(SkipReason::Misaligned));
    assert_eq!(ledger.pending("LiquidFuel"), 0.0);

    engine.refresh(&EngineModuleState {
        heading_alignment: Some(0.999),
        ..state
    });
    let tick = engine.advance(&mut ledger_with(&parts), &context(&config, 5_000.0, 10.0));
    assert_eq!(tick.status, EngineStatus::Burning);
}

#[test]
fn malformed_manifests_are_rejected() {
    let config = SimulationConfig::default();
    let library = ResourceLibrary::stock();

    let empty = EngineModuleState {
        manifest: ResourceManifest::new(),
        ..engine_state(1.0, 300.0, 1.0, "LiquidFuel=1")
    };
    assert_eq!(
        EngineRecord::from_state(PartId(5), &empty, &library, &config).err(),
        Some(PropulsionError::EmptyManifest { part: PartId(5) })
    );

    let unknown = engine_state(1.0, 300.0, 1.0, "Unobtainium=1");
    assert!(matches!(
        EngineRecord::from_state(PartId(5), &unknown, &library, &config),
        Err(PropulsionError::Resource { .. })
    ));

    let negative = engine_state(1.0, 300.0, 1.0, "LiquidFuel=-1");
    assert!(matches!(
        EngineRecord::from_state(PartId(5), &negative, &library, &config),
        Err(PropulsionError::InvalidRatio { .. })
    ));

    let massless = engine_state(1.0, 300.0, 1.0, "ElectricCharge=1");
    assert!(matches!(
        EngineRecord::from_state(PartId(5), &massless, &library, &config),
        Err(PropulsionError::NoMassBearingPropellant { .. })
    ));
}

#[test]
fn foreground_samples_are_smoothed() {
    let config = SimulationConfig {
        throttle_window: 4,
        ..SimulationConfig::default()
    };
    let mut engine = EngineRecord::from_state(
        PartId(1),
        &engine_state(1.0, 300.0, 1.0, "LiquidFuel=1"),
        &ResourceLibrary::stock(),
        &config,
    )
    .expect("engine");
    for _ in 0..3 {
        engine.observe_foreground(0.0, 300.0);
    }
    assert!((engine.smoothed_throttle() - 0.25).abs() < 1e-12);
    engine.reset_windows();
    assert_eq!(engine.smoothed_throttle(), 0.0);
}

proptest! {
    #[test]
    fn found_ratio_and_thrust_stay_bounded(
        stock in 0.0f64..50.0,
        throttle in 0.01f64..1.0,
        elapsed in 0.1f64..1_000.0,
    ) {
        let config = SimulationConfig::default();
        let mut engine = EngineRecord::from_state(
            PartId(1),
            &engine_state(20.0, 350.0, throttle, "LiquidFuel=0.9;Oxidizer=1.1"),
            &ResourceLibrary::stock(),
            &config,
        )
        .expect("engine");
        let mut ledger = ledger_with(&[
            PartStorage::new(PartId(2), "LiquidFuel", stock, 50.0),
            PartStorage::new(PartId(2), "Oxidizer", 50.0, 50.0),
        ]);
        let tick = engine.advance(&mut ledger, &context(&config, 10_000.0, elapsed));
        prop_assert!((0.0..=1.0).contains(&tick.found_ratio));
        prop_assert!((0.0..=1.0).contains(&tick.applied_ratio));
        prop_assert!(tick.effective_thrust_n <= 20_000.0 * throttle + 1e-6);
        prop_assert!(ledger.projected_available("LiquidFuel", elapsed) >= 0.0);
    }
}
