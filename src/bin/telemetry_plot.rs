use chrono::Local;
use clap::Parser;
use csv::ReaderBuilder;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Render delta-v accumulation and propellant remaining from fleet_sim telemetry"
)]
struct Cli {
    #[arg(long)]
    input: String,
    #[arg(long, default_value = "artifacts/telemetry.png")]
    output: PathBuf,
    /// Only plot this vessel id
    #[arg(long)]
    vessel: Option<u64>,
    #[arg(long, default_value_t = 1200)]
    width: u32,
    #[arg(long, default_value_t = 900)]
    height: u32,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    ut_s: f64,
    cumulative_dv_m_s: f64,
    propellant_units: f64,
}

#[derive(Debug, Default)]
struct Series {
    name: String,
    samples: Vec<Sample>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let series = read_series(&cli.input, cli.vessel)?;
    if series.values().all(|s| s.samples.is_empty()) {
        return Err(anyhow::anyhow!("No telemetry rows in the provided CSV"));
    }

    let (t_min, t_max) = range(series.values().flat_map(|s| s.samples.iter().map(|p| p.ut_s)));
    let (_, dv_max) = range(
        series
            .values()
            .flat_map(|s| s.samples.iter().map(|p| p.cumulative_dv_m_s)),
    );
    let (_, prop_max) = range(
        series
            .values()
            .flat_map(|s| s.samples.iter().map(|p| p.propellant_units)),
    );
    let t_max = if t_max > t_min { t_max } else { t_min + 1.0 };
    let dv_max = dv_max.max(1e-6) * 1.05;
    let prop_max = prop_max.max(1e-6) * 1.05;

    if let Some(parent) = cli.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let output_str = cli
        .output
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Output path contains invalid UTF-8"))?;
    let root = BitMapBackend::new(output_str, (cli.width, cli.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let font_family = select_font_family();
    let caption_font = FontDesc::new(font_family, 24.0, FontStyle::Bold);
    let label_font = FontDesc::new(font_family, 16.0, FontStyle::Normal);
    let caption = format!(
        "Background telemetry (rendered {})",
        Local::now().format("%Y-%m-%d %H:%M")
    );

    let (upper, lower) = root.split_vertically(cli.height / 2);
    {
        let mut chart = ChartBuilder::on(&upper)
            .margin(20)
            .caption(caption, caption_font)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(t_min..t_max, 0.0..dv_max)?;
        chart
            .configure_mesh()
            .x_desc("UT (s)")
            .y_desc("Cumulative Δv (m/s)")
            .label_style(label_font.clone())
            .x_labels(6)
            .y_labels(6)
            .draw()?;
        for (idx, s) in series.values().enumerate() {
            let color = Palette99::pick(idx).to_rgba();
            chart
                .draw_series(LineSeries::new(
                    s.samples.iter().map(|p| (p.ut_s, p.cumulative_dv_m_s)),
                    ShapeStyle::from(&color).stroke_width(2),
                ))?
                .label(s.name.clone())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], ShapeStyle::from(&color))
                });
        }
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(label_font.clone())
            .draw()?;
    }
    {
        let mut chart = ChartBuilder::on(&lower)
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(t_min..t_max, 0.0..prop_max)?;
        chart
            .configure_mesh()
            .x_desc("UT (s)")
            .y_desc("Propellant remaining (units)")
            .label_style(label_font.clone())
            .x_labels(6)
            .y_labels(6)
            .draw()?;
        for (idx, s) in series.values().enumerate() {
            let color = Palette99::pick(idx).to_rgba();
            chart.draw_series(LineSeries::new(
                s.samples.iter().map(|p| (p.ut_s, p.propellant_units)),
                ShapeStyle::from(&color).stroke_width(2),
            ))?;
        }
    }

    root.present()?;
    Ok(())
}

fn select_font_family() -> FontFamily<'static> {
    if cfg!(target_os = "macos") {
        FontFamily::Name("Helvetica")
    } else if cfg!(target_os = "windows") {
        FontFamily::Name("Arial")
    } else {
        FontFamily::Name("DejaVu Sans")
    }
}

fn read_series(path: &str, vessel_filter: Option<u64>) -> anyhow::Result<BTreeMap<u64, Series>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow::anyhow!("CSV missing '{}' column", name))
    };
    let ut_idx = column("ut_s")?;
    let id_idx = column("vessel_id")?;
    let name_idx = column("vessel_name")?;
    let dv_idx = column("cumulative_dv_m_s")?;
    let prop_idx = column("propellant_units")?;

    let mut series: BTreeMap<u64, Series> = BTreeMap::new();
    for rec in rdr.records() {
        let r = rec?;
        let Some(id) = r.get(id_idx).and_then(|v| v.parse::<u64>().ok()) else {
            continue;
        };
        if vessel_filter.is_some_and(|wanted| wanted != id) {
            continue;
        }
        let ut_s: f64 = r.get(ut_idx).unwrap_or("").parse().unwrap_or(f64::NAN);
        let cumulative_dv_m_s: f64 = r.get(dv_idx).unwrap_or("").parse().unwrap_or(f64::NAN);
        let propellant_units: f64 = r.get(prop_idx).unwrap_or("").parse().unwrap_or(f64::NAN);
        if !(ut_s.is_finite() && cumulative_dv_m_s.is_finite() && propellant_units.is_finite()) {
            continue;
        }
        let entry = series.entry(id).or_insert_with(|| Series {
            name: r.get(name_idx).unwrap_or("").to_string(),
            samples: Vec::new(),
        });
        entry.samples.push(Sample {
            ut_s,
            cumulative_dv_m_s,
            propellant_units,
        });
    }
    for s in series.values_mut() {
        s.samples.sort_by(|a, b| a.ut_s.total_cmp(&b.ut_s));
    }
    Ok(series)
}

fn range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}
