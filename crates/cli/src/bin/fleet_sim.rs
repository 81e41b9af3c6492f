use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use persistent_thrust::background::{AdvanceReport, BackgroundScheduler, Fleet, VesselRecord};
use persistent_thrust::core::ids::VesselId;
use persistent_thrust::core::vector;
use persistent_thrust::export::summary::{RunSummary, VesselSummary, write_summary};
use persistent_thrust::export::telemetry::{Record, write_header, writer_for_path};
use persistent_thrust::orbits::Orbit;
use persistent_thrust::scenario::{Scenario, ScenarioPaths};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Drive the background scheduler over a fleet scenario"
)]
struct Cli {
    /// Vessel catalog (YAML file, TOML file, or directory of TOML files)
    #[arg(long, default_value = "configs/fleet")]
    scenario: PathBuf,

    /// Celestial body catalog
    #[arg(long, default_value = "configs/bodies.yaml")]
    bodies: PathBuf,

    /// Resource definitions (defaults to the stock library)
    #[arg(long)]
    resources: Option<PathBuf>,

    /// Simulation tunables (TOML or YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of scheduler ticks to run
    #[arg(long, default_value_t = 500)]
    ticks: usize,

    /// Real seconds per tick
    #[arg(long, default_value_t = 0.02)]
    tick_seconds: f64,

    /// Time warp multiplier applied to each tick
    #[arg(long, default_value_t = 1000.0)]
    warp: f64,

    /// Universal time at the start of the run
    #[arg(long, default_value_t = 0.0)]
    start_ut: f64,

    /// Telemetry CSV output (`-` for stdout)
    #[arg(long)]
    telemetry: Option<PathBuf>,

    /// JSON run summary output
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    if cli.tick_seconds <= 0.0 || cli.warp <= 0.0 {
        bail!("--tick-seconds and --warp must be positive");
    }

    let scenario = Scenario::load(&ScenarioPaths {
        vessels: cli.scenario.clone(),
        bodies: cli.bodies.clone(),
        resources: cli.resources.clone(),
        config: cli.config.clone(),
    })
    .context("loading scenario")?;
    let Scenario {
        config,
        library,
        environment,
        mut fleet,
    } = scenario;

    let mut scheduler = BackgroundScheduler::local(config, library);
    let mut telemetry = match &cli.telemetry {
        Some(path) => {
            let mut writer = writer_for_path(path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_header(writer.as_mut())?;
            Some(writer)
        }
        None => None,
    };

    let mut summaries: BTreeMap<VesselId, VesselSummary> = fleet
        .iter()
        .map(|v| {
            (
                v.id,
                VesselSummary {
                    vessel_id: v.id.0,
                    vessel_name: v.name.clone(),
                    final_mass_kg: v.total_mass_kg(scheduler.library()),
                    final_sma_m: semi_major_axis(&fleet, v.id),
                    ..VesselSummary::default()
                },
            )
        })
        .collect();

    let step = cli.tick_seconds * cli.warp;
    let mut ut = cli.start_ut;
    for _ in 0..cli.ticks {
        ut += step;
        let report = scheduler.tick(&mut fleet, &environment, ut);
        let Some(advance) = report.advanced else {
            continue;
        };
        let Some(summary) = summaries.get_mut(&advance.vessel) else {
            continue;
        };
        summary.advances += 1;
        summary.simulated_s += advance.elapsed;
        summary.total_dv_m_s += advance.delta_v_magnitude();
        summary.propellant_used_kg += (advance.mass_before_kg - advance.mass_after_kg).max(0.0);
        summary.final_mass_kg = advance.mass_after_kg;
        summary.final_sma_m = semi_major_axis(&fleet, advance.vessel);
        summary.depletion_events += advance.depleted.len();

        if let Some(writer) = telemetry.as_mut() {
            let row = telemetry_row(&fleet, scheduler.record(advance.vessel), &advance, ut, summary);
            if let Some(row) = row {
                row.write_to(writer.as_mut())?;
            }
        }
    }
    if let Some(writer) = telemetry.as_mut() {
        writer.flush()?;
    }

    let run = RunSummary {
        ticks: cli.ticks,
        tick_seconds: cli.tick_seconds,
        warp: cli.warp,
        start_ut_s: cli.start_ut,
        end_ut_s: ut,
        vessels: summaries.into_values().collect(),
    };
    if let Some(path) = &cli.summary {
        write_summary(path, &run).with_context(|| format!("writing {}", path.display()))?;
    }

    info!(ticks = run.ticks, end_ut_s = run.end_ut_s, "fleet_sim_finished");
    println!("Simulated {} ticks to UT {:.1} s", run.ticks, run.end_ut_s);
    for vessel in &run.vessels {
        println!(
            "  {:<24} advances={:<5} Δv={:>10.3} m/s  propellant={:>10.3} kg  mass={:>10.3} kg",
            vessel.vessel_name,
            vessel.advances,
            vessel.total_dv_m_s,
            vessel.propellant_used_kg,
            vessel.final_mass_kg,
        );
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn semi_major_axis(fleet: &Fleet, id: VesselId) -> Option<f64> {
    fleet
        .get(id)
        .map(|v| v.orbit.semi_major_axis())
        .filter(|a| a.is_finite() && *a > 0.0)
}

fn telemetry_row<'a>(
    fleet: &'a Fleet,
    record: Option<&VesselRecord>,
    advance: &AdvanceReport,
    ut: f64,
    summary: &VesselSummary,
) -> Option<Record<'a>> {
    let vessel = fleet.get(advance.vessel)?;
    let propellants: BTreeSet<&str> = record
        .map(|r| {
            r.engines
                .values()
                .flat_map(|e| e.propellants.iter())
                .filter(|p| !p.massless)
                .map(|p| p.resource.as_str())
                .collect()
        })
        .unwrap_or_default();
    let propellant_units = vessel
        .storage
        .iter()
        .filter(|s| propellants.contains(s.resource.as_str()))
        .map(|s| s.clamped_amount())
        .sum();

    Some(Record {
        ut_s: ut,
        vessel_id: vessel.id.0,
        vessel_name: &vessel.name,
        elapsed_s: advance.elapsed,
        dv_m_s: advance.delta_v_magnitude(),
        cumulative_dv_m_s: summary.total_dv_m_s,
        found_ratio: advance.mean_found_ratio(),
        mass_kg: advance.mass_after_kg,
        propellant_units,
        speed_m_s: vector::norm(&vessel.orbit.velocity_at(ut)),
        sma_m: summary.final_sma_m,
        depleted: !advance.depleted.is_empty(),
    })
}
