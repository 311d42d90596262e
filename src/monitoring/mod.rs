pub mod phase_log;

pub use phase_log::{summarize_phase_log, PhaseLogRecord, PhaseLogSummary, PhaseLogger};
