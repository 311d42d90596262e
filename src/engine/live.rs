// engine/live.rs
//
// Live control loop for a single overhead camera. Each processed frame goes
// through the detector, is split into approaches by zone, feeds one tracker
// per approach, and ends in exactly one controller update.

use crate::config::SystemConfig;
use crate::control_system::traffic_light_controller::SignalController;
use crate::error::Result;
use crate::shared_data::{Direction, DirectionTraffic, SignalStatus, TrafficSummary};
use crate::vehicle_tracking::detector::{
    detect_with_timeout, validate_detections, FrameMeta, FrameSource, VehicleDetector,
};
use crate::vehicle_tracking::tracker::{Tracker, TrackerStats};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    SourceExhausted,
    Cancelled,
}

/// Session statistics returned when the loop stops.
#[derive(Debug, Clone, Serialize)]
pub struct LiveReport {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub total_vehicles_detected: u64,
    pub cycles_completed: u64,
    pub runtime: Duration,
    pub tracker_stats: BTreeMap<Direction, TrackerStats>,
    pub stop_reason: StopReason,
}

/// One processed frame, handed to the caller's observer.
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub frame_index: u64,
    pub traffic: TrafficSummary,
    pub status: SignalStatus,
}

#[derive(Debug, Clone, Default)]
pub struct LiveOptions {
    /// Minimum wall time between frame reads, for sources that do not pace
    /// themselves.
    pub frame_interval: Option<Duration>,
}

/// Runs until the source is exhausted or `shutdown` fires.
///
/// Sending on (or dropping) the shutdown sender stops the loop before the next
/// frame, or abandons an in-flight detector call. The controller is borrowed,
/// never left mid-transition, and can be resumed or discarded by the caller.
/// Detector, frame-source and validation failures stop the loop with an error.
pub async fn run_live<S, D, F>(
    mut source: S,
    detector: D,
    controller: &mut SignalController,
    config: &SystemConfig,
    options: LiveOptions,
    mut shutdown: watch::Receiver<bool>,
    mut on_frame: F,
) -> Result<LiveReport>
where
    S: FrameSource<Frame = D::Frame>,
    D: VehicleDetector,
    F: FnMut(&FrameOutcome, &SignalController),
{
    let detector = Arc::new(Mutex::new(detector));
    let mut trackers: BTreeMap<Direction, Tracker> = config
        .zones
        .directions()
        .into_iter()
        .map(|direction| (direction, Tracker::new(config.tracker.clone())))
        .collect();

    let started = Instant::now();
    let starting_cycles = controller.cycle_count();
    let stride = config.detection.process_every_n_frames as u64;
    let mut frames_read = 0u64;
    let mut frames_processed = 0u64;
    let mut total_vehicles = 0u64;

    let stop_reason = loop {
        if *shutdown.borrow() {
            break StopReason::Cancelled;
        }
        if let Some(interval) = options.frame_interval {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break StopReason::Cancelled,
                _ = sleep(interval) => {}
            }
        }

        let Some(frame) = source.next_frame()? else {
            break StopReason::SourceExhausted;
        };
        let frame_index = frames_read;
        frames_read += 1;
        if frame_index % stride != 0 {
            continue;
        }

        let frame_size = frame.frame_size();
        let raw = tokio::select! {
            biased;
            _ = shutdown.changed() => break StopReason::Cancelled,
            raw = detect_with_timeout(&detector, frame, config.detection.detector_timeout) => raw?,
        };
        let detections = validate_detections(raw, config.detection.min_confidence)?;
        total_vehicles += detections.len() as u64;

        let now = Instant::now();
        let mut groups = config.zones.partition(detections, frame_size);
        let mut traffic = TrafficSummary::new();
        for (&direction, tracker) in trackers.iter_mut() {
            let group = groups.remove(&direction).unwrap_or_default();
            let tagged = tracker.update(group, now);
            tracker.cleanup(now);
            let count = tagged.len();
            traffic.insert(
                direction,
                DirectionTraffic::new(count, config.density.classify(count)),
            );
        }
        debug!("Frame {}: {:?}", frame_index, traffic);

        let status = controller.update(&traffic, now);
        frames_processed += 1;
        on_frame(
            &FrameOutcome {
                frame_index,
                traffic,
                status,
            },
            controller,
        );
    };

    let report = LiveReport {
        frames_read,
        frames_processed,
        total_vehicles_detected: total_vehicles,
        cycles_completed: controller.cycle_count() - starting_cycles,
        runtime: started.elapsed(),
        tracker_stats: trackers
            .iter()
            .map(|(&direction, tracker)| (direction, tracker.stats()))
            .collect(),
        stop_reason,
    };
    info!(
        "Live loop stopped ({:?}) after {} frames, {} processed, {} cycles",
        report.stop_reason, report.frames_read, report.frames_processed, report.cycles_completed
    );
    Ok(report)
}
