//! Export helpers for background telemetry artifacts.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub mod telemetry {
    use std::fs::{self, File};
    use std::io::{self, BufWriter, Write};
    use std::path::Path;

    /// Column order shared by the writer and the plotting binary.
    pub const HEADER: &str = "ut_s,vessel_id,vessel_name,elapsed_s,dv_m_s,cumulative_dv_m_s,found_ratio,mass_kg,propellant_units,speed_m_s,sma_m,depleted";

    /// Create a writer for the target path, handling stdout (`-`) by convention.
    pub fn writer_for_path(path: &Path) -> io::Result<Box<dyn Write>> {
        if path == Path::new("-") {
            return Ok(Box::new(BufWriter::new(io::stdout())));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Box::new(BufWriter::new(file)))
    }

    pub fn write_header(writer: &mut dyn Write) -> io::Result<()> {
        let mut csv = row_writer(writer);
        csv.write_record(HEADER.split(','))?;
        csv.flush()
    }

    /// One row per full background advance.
    #[derive(Debug, Clone)]
    pub struct Record<'a> {
        pub ut_s: f64,
        pub vessel_id: u64,
        pub vessel_name: &'a str,
        pub elapsed_s: f64,
        pub dv_m_s: f64,
        pub cumulative_dv_m_s: f64,
        /// Empty when no engine attempted a burn.
        pub found_ratio: Option<f64>,
        pub mass_kg: f64,
        /// Units of engine propellant left on board.
        pub propellant_units: f64,
        pub speed_m_s: f64,
        /// Empty for open orbits.
        pub sma_m: Option<f64>,
        pub depleted: bool,
    }

    impl Record<'_> {
        pub fn write_to(&self, writer: &mut dyn Write) -> io::Result<()> {
            let mut csv = row_writer(writer);
            csv.write_record([
                format!("{:.3}", self.ut_s),
                self.vessel_id.to_string(),
                self.vessel_name.to_string(),
                format!("{:.3}", self.elapsed_s),
                format!("{:.6}", self.dv_m_s),
                format!("{:.6}", self.cumulative_dv_m_s),
                self.found_ratio
                    .map(|r| format!("{r:.6}"))
                    .unwrap_or_default(),
                format!("{:.3}", self.mass_kg),
                format!("{:.6}", self.propellant_units),
                format!("{:.6}", self.speed_m_s),
                self.sma_m.map(|a| format!("{a:.3}")).unwrap_or_default(),
                self.depleted.to_string(),
            ])?;
            csv.flush()
        }
    }

    fn row_writer(writer: &mut dyn Write) -> csv::Writer<&mut dyn Write> {
        csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer)
    }
}

pub mod summary {
    use std::fs::{self, File};
    use std::path::Path;

    use serde::Serialize;
    use serde_json::to_writer_pretty;

    use crate::ExportError;

    /// Totals for one vessel across a run.
    #[derive(Debug, Clone, Default, Serialize)]
    pub struct VesselSummary {
        pub vessel_id: u64,
        pub vessel_name: String,
        pub advances: usize,
        pub simulated_s: f64,
        pub total_dv_m_s: f64,
        pub propellant_used_kg: f64,
        pub final_mass_kg: f64,
        pub final_sma_m: Option<f64>,
        pub depletion_events: usize,
    }

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct RunSummary {
        pub ticks: usize,
        pub tick_seconds: f64,
        pub warp: f64,
        pub start_ut_s: f64,
        pub end_ut_s: f64,
        pub vessels: Vec<VesselSummary>,
    }

    pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<(), ExportError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        to_writer_pretty(File::create(path)?, summary)?;
        Ok(())
    }
}
