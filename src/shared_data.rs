// src/shared_data.rs

use crate::error::SignalError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One of the four approaches of the intersection.
///
/// The declaration order (North, South, East, West) is the fixed tie-break
/// order used whenever two approaches are otherwise equal in priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "NORTH",
            Direction::South => "SOUTH",
            Direction::East => "EAST",
            Direction::West => "WEST",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORTH" | "N" => Ok(Direction::North),
            "SOUTH" | "S" => Ok(Direction::South),
            "EAST" | "E" => Ok(Direction::East),
            "WEST" | "W" => Ok(Direction::West),
            _ => Err(SignalError::UnknownDirection(s.to_string())),
        }
    }
}

/// Discretized congestion bucket, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DensityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl DensityLevel {
    pub const ALL: [DensityLevel; 4] = [
        DensityLevel::Low,
        DensityLevel::Medium,
        DensityLevel::High,
        DensityLevel::Critical,
    ];

    /// Priority rank used by the sequence planner (higher is served first).
    pub fn severity_rank(&self) -> u8 {
        match self {
            DensityLevel::Low => 1,
            DensityLevel::Medium => 2,
            DensityLevel::High => 3,
            DensityLevel::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DensityLevel::Low => "LOW",
            DensityLevel::Medium => "MEDIUM",
            DensityLevel::High => "HIGH",
            DensityLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for DensityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DensityLevel {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(DensityLevel::Low),
            "MEDIUM" => Ok(DensityLevel::Medium),
            "HIGH" => Ok(DensityLevel::High),
            "CRITICAL" => Ok(DensityLevel::Critical),
            _ => Err(SignalError::UnknownDensityLevel(s.to_string())),
        }
    }
}

/// The possible states for one approach's signal head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalPhase {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for SignalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalPhase::Green => "GREEN",
            SignalPhase::Yellow => "YELLOW",
            SignalPhase::Red => "RED",
        };
        f.write_str(name)
    }
}

/// Observed load on a single approach: a vehicle count (or a truncated batch
/// average) and the density level it was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionTraffic {
    pub count: usize,
    pub density: DensityLevel,
}

impl DirectionTraffic {
    pub fn new(count: usize, density: DensityLevel) -> Self {
        Self { count, density }
    }

    /// Stand-in for an approach that was not observed at all.
    pub fn unobserved() -> Self {
        Self {
            count: 0,
            density: DensityLevel::Low,
        }
    }
}

/// Per-direction traffic for one processing step. Directions may be missing.
pub type TrafficSummary = BTreeMap<Direction, DirectionTraffic>;

/// Read-only view of the live controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalStatus {
    /// `None` until the controller has been updated for the first time.
    pub active_direction: Option<Direction>,
    pub phase: SignalPhase,
    /// Time left in the current phase; fractional seconds on the wire.
    #[serde(rename = "remaining_secs", with = "duration_secs")]
    pub remaining: Duration,
    pub cycle_count: u64,
}

mod duration_secs {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}

/// Timing packaged for one approach of a recommendation. Durations in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionRecommendation {
    pub density_level: DensityLevel,
    pub vehicle_count: usize,
    pub green_duration: u64,
    pub yellow_duration: u64,
    pub total_duration: u64,
}

/// The timing-and-ordering output for the next rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub timestamp: u64,
    pub directions: BTreeMap<Direction, DirectionRecommendation>,
    pub optimal_sequence: Vec<Direction>,
    pub signal_status: Option<SignalStatus>,
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
