use std::time::Duration;
use thiserror::Error;

use crate::shared_data::Direction;

/// Every failure the signal engine can report to its caller.
///
/// Input errors are recoverable by supplying corrected input. Collaborator
/// errors (detector, frame source, broker) mean no decision can be made for
/// that input and are never swallowed.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("invalid detection: {0}")]
    InvalidDetection(String),

    #[error("unknown vehicle class '{0}'")]
    UnknownVehicleClass(String),

    #[error("unknown direction '{0}'")]
    UnknownDirection(String),

    #[error("unknown density level '{0}'")]
    UnknownDensityLevel(String),

    #[error("negative vehicle count {count} for {direction:?}")]
    NegativeCount { direction: Direction, count: f64 },

    #[error("direction {0} was supplied more than once")]
    DuplicateDirection(Direction),

    #[error("traffic summary is empty")]
    EmptySummary,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("detector failed: {0}")]
    Detector(String),

    #[error("detector did not answer within {timeout:?}")]
    DetectorTimeout { timeout: Duration },

    #[error("frame source failed: {0}")]
    FrameSource(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("message broker: {0}")]
    Messaging(#[from] amiquip::Error),
}

pub type Result<T> = std::result::Result<T, SignalError>;
