// monitoring/phase_log.rs
//
// Append-only CSV log of completed signal phases, plus a reader that turns a
// log back into per-direction totals for reporting.

use crate::control_system::traffic_light_controller::{PhaseRecord, SignalController};
use crate::error::Result;
use crate::shared_data::{current_timestamp, DensityLevel, Direction, SignalPhase};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseLogRecord {
    pub timestamp: u64,
    pub sequence: u64,
    pub cycle: u64,
    pub direction: Direction,
    pub phase: SignalPhase,
    pub density: DensityLevel,
    pub planned_secs: f64,
    pub actual_secs: f64,
    pub forced: bool,
}

impl From<&PhaseRecord> for PhaseLogRecord {
    fn from(record: &PhaseRecord) -> Self {
        Self {
            timestamp: current_timestamp(),
            sequence: record.sequence,
            cycle: record.cycle,
            direction: record.direction,
            phase: record.phase,
            density: record.density,
            planned_secs: record.planned.as_secs_f64(),
            actual_secs: record.actual.as_secs_f64(),
            forced: record.forced,
        }
    }
}

/// Appends one record, writing the header only when the file is new.
fn log_to_csv<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let file_exists = path.exists();
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(record)?;
    wtr.flush()?;
    Ok(())
}

/// Copies phases the controller finished since the last call into the log.
#[derive(Debug)]
pub struct PhaseLogger {
    path: PathBuf,
    next_sequence: u64,
}

impl PhaseLogger {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            next_sequence: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of records written.
    pub fn record_new(&mut self, controller: &SignalController) -> Result<usize> {
        let mut written = 0;
        for record in controller.history_since(self.next_sequence) {
            log_to_csv(&self.path, &PhaseLogRecord::from(record))?;
            self.next_sequence = record.sequence + 1;
            written += 1;
        }
        if written > 0 {
            debug!("Logged {} phase(s) to {}", written, self.path.display());
        }
        Ok(written)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectionPhaseStats {
    pub green_phases: u64,
    pub total_green_secs: f64,
    pub forced_phases: u64,
}

impl DirectionPhaseStats {
    pub fn average_green_secs(&self) -> f64 {
        if self.green_phases == 0 {
            0.0
        } else {
            self.total_green_secs / self.green_phases as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseLogSummary {
    pub records: u64,
    pub cycles: u64,
    pub directions: BTreeMap<Direction, DirectionPhaseStats>,
}

pub fn summarize_phase_log<P: AsRef<Path>>(path: P) -> Result<PhaseLogSummary> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut summary = PhaseLogSummary::default();
    for result in rdr.deserialize() {
        let record: PhaseLogRecord = result?;
        summary.records += 1;
        summary.cycles = summary.cycles.max(record.cycle);
        let stats = summary.directions.entry(record.direction).or_default();
        if record.forced {
            stats.forced_phases += 1;
        }
        if record.phase == SignalPhase::Green {
            stats.green_phases += 1;
            stats.total_green_secs += record.actual_secs;
        }
    }
    Ok(summary)
}
