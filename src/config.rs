// src/config.rs
//
// Every tunable constant of the engine is data, injected through
// `SystemConfig`. `Default` reproduces the field-tested values; a JSON file
// can override any section.

use crate::error::{Result, SignalError};
use crate::flow_analyzer::density::DensityThresholds;
use crate::global_variables::{
    CONFIDENCE_THRESHOLD, DETECTOR_TIMEOUT_MS, MAX_FRAMES_PER_DIRECTION, MAX_GREEN_DURATION,
    MIN_GREEN_DURATION, PHASE_HISTORY_CAPACITY, PROCESS_EVERY_N_FRAMES,
};
use crate::shared_data::{DensityLevel, Direction};
use crate::vehicle_tracking::tracker::TrackerConfig;
use crate::vehicle_tracking::zones::IntersectionZones;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Signal timing for one density level, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub green: u64,
    pub yellow: u64,
    pub min_green: u64,
}

impl PhaseTiming {
    pub const fn new(green: u64, yellow: u64, min_green: u64) -> Self {
        Self {
            green,
            yellow,
            min_green,
        }
    }
}

/// Density level → timing. One entry per level, so lookups cannot miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingTable {
    pub low: PhaseTiming,
    pub medium: PhaseTiming,
    pub high: PhaseTiming,
    pub critical: PhaseTiming,
}

impl TimingTable {
    pub fn get(&self, level: DensityLevel) -> &PhaseTiming {
        match level {
            DensityLevel::Low => &self.low,
            DensityLevel::Medium => &self.medium,
            DensityLevel::High => &self.high,
            DensityLevel::Critical => &self.critical,
        }
    }

    /// Builds a table from a partial per-level map. Levels missing from the map
    /// take the LOW entry (the map's own LOW if present, else the default).
    pub fn from_partial(entries: &HashMap<DensityLevel, PhaseTiming>) -> Self {
        let low = entries
            .get(&DensityLevel::Low)
            .copied()
            .unwrap_or(TimingTable::default().low);
        let pick = |level: DensityLevel| {
            entries.get(&level).copied().unwrap_or_else(|| {
                debug!("No timing configured for {}, falling back to LOW", level);
                low
            })
        };
        Self {
            low,
            medium: pick(DensityLevel::Medium),
            high: pick(DensityLevel::High),
            critical: pick(DensityLevel::Critical),
        }
    }
}

impl Default for TimingTable {
    fn default() -> Self {
        Self {
            low: PhaseTiming::new(15, 3, 10),
            medium: PhaseTiming::new(30, 3, 20),
            high: PhaseTiming::new(45, 3, 30),
            critical: PhaseTiming::new(60, 3, 40),
        }
    }
}

/// Timing table plus the global safety clamps on green time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalConfig {
    pub timings: TimingTable,
    pub min_green: u64,
    pub max_green: u64,
}

impl SignalConfig {
    /// Green time for `level`, clamped to `[max(min_green, level.min_green), max_green]`.
    pub fn green_duration(&self, level: DensityLevel) -> u64 {
        let timing = self.timings.get(level);
        let lower = self.min_green.max(timing.min_green);
        timing.green.max(lower).min(self.max_green)
    }

    pub fn yellow_duration(&self, level: DensityLevel) -> u64 {
        self.timings.get(level).yellow
    }

    fn validate(&self) -> Result<()> {
        if self.min_green > self.max_green {
            return Err(SignalError::InvalidConfig(format!(
                "min green {}s exceeds max green {}s",
                self.min_green, self.max_green
            )));
        }
        for level in DensityLevel::ALL {
            let timing = self.timings.get(level);
            if timing.green == 0 || timing.yellow == 0 {
                return Err(SignalError::InvalidConfig(format!(
                    "{} timing must have non-zero green and yellow",
                    level
                )));
            }
            if timing.min_green > self.max_green {
                return Err(SignalError::InvalidConfig(format!(
                    "{} min green {}s exceeds max green {}s",
                    level, timing.min_green, self.max_green
                )));
            }
        }
        Ok(())
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            timings: TimingTable::default(),
            min_green: MIN_GREEN_DURATION,
            max_green: MAX_GREEN_DURATION,
        }
    }
}

/// Settings applied at the detector boundary and by the frame pipelines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionConfig {
    /// Detections below this confidence are dropped before tracking.
    pub min_confidence: f32,
    pub detector_timeout: Duration,
    /// Only every n-th frame is sent to the detector.
    pub process_every_n_frames: usize,
    /// Upper bound on frames read per direction in batch mode.
    pub max_frames_per_direction: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: CONFIDENCE_THRESHOLD,
            detector_timeout: Duration::from_millis(DETECTOR_TIMEOUT_MS),
            process_every_n_frames: PROCESS_EVERY_N_FRAMES,
            max_frames_per_direction: MAX_FRAMES_PER_DIRECTION,
        }
    }
}

impl DetectionConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(SignalError::InvalidConfig(format!(
                "confidence threshold {} outside [0, 1]",
                self.min_confidence
            )));
        }
        if self.detector_timeout.is_zero() {
            return Err(SignalError::InvalidConfig(
                "detector timeout must be positive".to_string(),
            ));
        }
        if self.process_every_n_frames == 0 || self.max_frames_per_direction == 0 {
            return Err(SignalError::InvalidConfig(
                "frame stride and frame budget must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemConfig {
    pub density: DensityThresholds,
    pub signal: SignalConfig,
    pub tracker: TrackerConfig,
    pub detection: DetectionConfig,
    pub zones: IntersectionZones,
    pub phase_history_capacity: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            density: DensityThresholds::default(),
            signal: SignalConfig::default(),
            tracker: TrackerConfig::default(),
            detection: DetectionConfig::default(),
            zones: IntersectionZones::default(),
            phase_history_capacity: PHASE_HISTORY_CAPACITY,
        }
    }
}

// On-disk layout. Every section is optional; durations are plain numbers.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    density_thresholds: Option<DensityThresholdsFile>,
    signal_timings: Option<HashMap<DensityLevel, PhaseTiming>>,
    min_green_duration: Option<u64>,
    max_green_duration: Option<u64>,
    tracking: Option<TrackingFile>,
    detection: Option<DetectionFile>,
    detection_zones: Option<HashMap<Direction, Vec<(f64, f64)>>>,
    phase_history_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DensityThresholdsFile {
    low_max: usize,
    medium_max: usize,
    high_max: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TrackingFile {
    max_distance: Option<f64>,
    eviction_window_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DetectionFile {
    confidence_threshold: Option<f32>,
    detector_timeout_ms: Option<u64>,
    process_every_n_frames: Option<usize>,
    max_frames_per_direction: Option<usize>,
}

impl SystemConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&contents)?;
        info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Parses a JSON document; sections it omits keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(contents)?;
        let mut config = SystemConfig::default();

        if let Some(d) = file.density_thresholds {
            config.density = DensityThresholds {
                low_max: d.low_max,
                medium_max: d.medium_max,
                high_max: d.high_max,
            };
        }
        if let Some(entries) = file.signal_timings {
            config.signal.timings = TimingTable::from_partial(&entries);
        }
        if let Some(min) = file.min_green_duration {
            config.signal.min_green = min;
        }
        if let Some(max) = file.max_green_duration {
            config.signal.max_green = max;
        }
        if let Some(t) = file.tracking {
            if let Some(distance) = t.max_distance {
                config.tracker.max_distance = distance;
            }
            if let Some(ms) = t.eviction_window_ms {
                config.tracker.eviction_window = Duration::from_millis(ms);
            }
        }
        if let Some(d) = file.detection {
            if let Some(conf) = d.confidence_threshold {
                config.detection.min_confidence = conf;
            }
            if let Some(ms) = d.detector_timeout_ms {
                config.detection.detector_timeout = Duration::from_millis(ms);
            }
            if let Some(n) = d.process_every_n_frames {
                config.detection.process_every_n_frames = n;
            }
            if let Some(n) = d.max_frames_per_direction {
                config.detection.max_frames_per_direction = n;
            }
        }
        if let Some(zones) = file.detection_zones {
            config.zones = IntersectionZones::from_polygons(zones)?;
        }
        if let Some(capacity) = file.phase_history_capacity {
            config.phase_history_capacity = capacity;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.density.validate()?;
        self.signal.validate()?;
        self.tracker.validate()?;
        self.detection.validate()?;
        if self.phase_history_capacity == 0 {
            return Err(SignalError::InvalidConfig(
                "phase history capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
