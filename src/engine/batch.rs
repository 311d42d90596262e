// engine/batch.rs
//
// Offline analysis: one recorded input (video or single image) per approach.
// Each approach runs in its own task with its own detector and tracker; the
// tasks are joined before anything looks across directions.

use crate::config::SystemConfig;
use crate::control_system::traffic_light_controller::SignalController;
use crate::error::{Result, SignalError};
use crate::flow_analyzer::aggregator::aggregate;
use crate::shared_data::{DensityLevel, Direction, DirectionTraffic, Recommendation, TrafficSummary};
use crate::vehicle_tracking::detector::{
    detect_with_timeout, validate_detections, FrameMeta, FrameSource, VehicleDetector,
};
use crate::vehicle_tracking::tracker::Tracker;
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Statistics for one approach after its input was processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionResult {
    pub direction: Direction,
    pub frames_read: usize,
    pub frames_processed: usize,
    /// Mean vehicles per processed frame.
    pub average_vehicles: f64,
    pub max_vehicles: usize,
    /// Distinct tracks opened over the whole input.
    pub unique_vehicles: u64,
    pub density_level: DensityLevel,
}

impl DirectionResult {
    /// Truncated average, the count used for classification and timing.
    pub fn traffic(&self) -> DirectionTraffic {
        DirectionTraffic::new(self.average_vehicles.trunc() as usize, self.density_level)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: BTreeMap<Direction, DirectionResult>,
    pub recommendation: Recommendation,
}

/// One approach's recorded input and the detector instance that will read it.
pub struct DirectionInput<S, D> {
    pub direction: Direction,
    pub source: S,
    pub detector: D,
}

/// Runs detection and tracking over one approach's frames.
///
/// The tracker clock is fixed by the first frame: recorded capture offsets
/// when it carries one, the wall clock otherwise. A later frame that does not
/// follow the same clock fails the direction with `FrameSource`.
pub async fn process_direction<S, D>(
    direction: Direction,
    mut source: S,
    detector: D,
    config: &SystemConfig,
) -> Result<DirectionResult>
where
    S: FrameSource<Frame = D::Frame>,
    D: VehicleDetector,
{
    let detector = Arc::new(Mutex::new(detector));
    let mut tracker = Tracker::new(config.tracker.clone());
    let stride = config.detection.process_every_n_frames;
    let session_start = Instant::now();

    let mut frames_read = 0;
    let mut frames_processed = 0;
    let mut vehicle_sum = 0usize;
    let mut max_vehicles = 0usize;
    let mut recorded_clock: Option<bool> = None;

    while frames_read < config.detection.max_frames_per_direction {
        let Some(frame) = source.next_frame()? else {
            break;
        };
        let index = frames_read;
        frames_read += 1;
        let stamped = frame.captured_at().is_some();
        match recorded_clock {
            None => recorded_clock = Some(stamped),
            Some(expected) if expected != stamped => {
                return Err(SignalError::FrameSource(format!(
                    "{}: frame {} {} a capture timestamp, unlike the first frame",
                    direction,
                    index,
                    if stamped { "has" } else { "lacks" }
                )));
            }
            Some(_) => {}
        }
        if index % stride != 0 {
            continue;
        }

        let now = frame
            .captured_at()
            .map(|offset| session_start + offset)
            .unwrap_or_else(Instant::now);
        let raw = detect_with_timeout(&detector, frame, config.detection.detector_timeout).await?;
        let detections = validate_detections(raw, config.detection.min_confidence)?;
        let tagged = tracker.update(detections, now);
        tracker.cleanup(now);

        let count = tagged.len();
        vehicle_sum += count;
        max_vehicles = max_vehicles.max(count);
        frames_processed += 1;
    }

    if frames_processed == 0 {
        warn!("{}: no frames processed, reporting empty approach", direction);
    }
    let average_vehicles = if frames_processed == 0 {
        0.0
    } else {
        vehicle_sum as f64 / frames_processed as f64
    };
    let density_level = config.density.classify(average_vehicles.trunc() as usize);
    let stats = tracker.stats();

    info!(
        "{}: {} frames processed, avg {:.2} vehicles, max {}, {} tracked, {}",
        direction, frames_processed, average_vehicles, max_vehicles, stats.tracks_created, density_level
    );

    Ok(DirectionResult {
        direction,
        frames_read,
        frames_processed,
        average_vehicles,
        max_vehicles,
        unique_vehicles: stats.tracks_created,
        density_level,
    })
}

/// Processes every approach concurrently, waits for all of them, then builds
/// one recommendation. An attached controller is updated exactly once, after
/// the join.
pub async fn analyze_batch<S, D>(
    inputs: Vec<DirectionInput<S, D>>,
    config: Arc<SystemConfig>,
    controller: Option<&mut SignalController>,
) -> Result<BatchReport>
where
    S: FrameSource<Frame = D::Frame> + 'static,
    D: VehicleDetector,
{
    let mut seen = HashSet::new();
    for input in &inputs {
        if !seen.insert(input.direction) {
            return Err(SignalError::DuplicateDirection(input.direction));
        }
    }

    let handles: Vec<_> = inputs
        .into_iter()
        .map(|input| {
            let config = Arc::clone(&config);
            let direction = input.direction;
            let handle = tokio::spawn(async move {
                process_direction(input.direction, input.source, input.detector, &config).await
            });
            (direction, handle)
        })
        .collect();

    // Join every pipeline before surfacing the first failure.
    let mut outcomes = Vec::with_capacity(handles.len());
    for (direction, handle) in handles {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(SignalError::Detector(format!(
                "{} pipeline aborted: {}",
                direction, join_error
            ))),
        };
        outcomes.push(outcome);
    }

    let mut results = BTreeMap::new();
    for outcome in outcomes {
        let result = outcome?;
        results.insert(result.direction, result);
    }

    let summary: TrafficSummary = results
        .iter()
        .map(|(&direction, result)| (direction, result.traffic()))
        .collect();
    let recommendation = aggregate(
        &summary,
        &config.signal,
        controller.map(|ctrl| (ctrl, Instant::now())),
    )?;

    Ok(BatchReport {
        results,
        recommendation,
    })
}
