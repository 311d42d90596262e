use crate::error::{Result, SignalError};
use crate::global_variables::{HIGH_MAX_VEHICLES, LOW_MAX_VEHICLES, MEDIUM_MAX_VEHICLES};
use crate::shared_data::DensityLevel;
use serde::Serialize;

/// Inclusive upper vehicle count of each non-critical level.
/// Anything above `high_max` is CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DensityThresholds {
    pub low_max: usize,
    pub medium_max: usize,
    pub high_max: usize,
}

impl Default for DensityThresholds {
    fn default() -> Self {
        Self {
            low_max: LOW_MAX_VEHICLES,
            medium_max: MEDIUM_MAX_VEHICLES,
            high_max: HIGH_MAX_VEHICLES,
        }
    }
}

impl DensityThresholds {
    pub fn validate(&self) -> Result<()> {
        if self.low_max < self.medium_max && self.medium_max < self.high_max {
            Ok(())
        } else {
            Err(SignalError::InvalidConfig(format!(
                "density boundaries must be strictly increasing, got {}/{}/{}",
                self.low_max, self.medium_max, self.high_max
            )))
        }
    }

    pub fn classify(&self, count: usize) -> DensityLevel {
        if count <= self.low_max {
            DensityLevel::Low
        } else if count <= self.medium_max {
            DensityLevel::Medium
        } else if count <= self.high_max {
            DensityLevel::High
        } else {
            DensityLevel::Critical
        }
    }
}

/// Classifies a vehicle count with the default boundaries
/// (≤5 LOW, 6–15 MEDIUM, 16–25 HIGH, ≥26 CRITICAL).
pub fn classify(count: usize) -> DensityLevel {
    DensityThresholds::default().classify(count)
}

/// Classifies a vehicle count with injected boundaries.
pub fn classify_with(count: usize, thresholds: &DensityThresholds) -> DensityLevel {
    thresholds.classify(count)
}
