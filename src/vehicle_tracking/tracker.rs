// vehicle_tracking/tracker.rs
//
// Nearest-centroid tracker. Turns each frame's detection list into detections
// tagged with stable identities, so a vehicle seen on consecutive frames is
// counted once.
//
//   - Greedy matching in detection-list order. Each detection takes the
//     nearest live track strictly inside `max_distance`; a track claimed
//     earlier in the same frame is not offered again, so two detections of
//     one frame never share an identity and a frame's vehicle count is the
//     length of its tagged list.
//   - Unmatched detections open a new track (id = previous maximum + 1).
//   - Tracks die only in `cleanup`, once unseen for longer than
//     `eviction_window`.
//
// One instance per camera feed. Instances never share identities.

use crate::data_structures::{BoundingBox, Detection, TrackedDetection};
use crate::error::{Result, SignalError};
use crate::global_variables::{TRACKING_EVICTION_WINDOW_MS, TRACKING_MAX_DISTANCE};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerConfig {
    /// Maximum center-to-center distance, in pixels, for a detection to
    /// continue an existing track.
    pub max_distance: f64,
    /// How long a track may go unseen before `cleanup` drops it.
    pub eviction_window: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_distance: TRACKING_MAX_DISTANCE,
            eviction_window: Duration::from_millis(TRACKING_EVICTION_WINDOW_MS),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.max_distance.is_finite() || self.max_distance <= 0.0 {
            return Err(SignalError::InvalidConfig(format!(
                "tracking distance {} must be a positive number",
                self.max_distance
            )));
        }
        if self.eviction_window.is_zero() {
            return Err(SignalError::InvalidConfig(
                "tracking eviction window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Last known state of one tracked vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: u64,
    pub center: (f64, f64),
    pub bbox: BoundingBox,
    pub last_seen: Instant,
}

impl Track {
    fn distance_to(&self, point: (f64, f64)) -> f64 {
        let dx = self.center.0 - point.0;
        let dy = self.center.1 - point.1;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub total_detections: u64,
    pub live_tracks: usize,
    pub tracks_created: u64,
}

#[derive(Debug)]
pub struct Tracker {
    config: TrackerConfig,
    tracks: BTreeMap<u64, Track>,
    next_id: u64,
    total_detections: u64,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
            next_id: 0,
            total_detections: 0,
        }
    }

    /// Assigns a track identity to every detection of one frame.
    pub fn update(&mut self, detections: Vec<Detection>, now: Instant) -> Vec<TrackedDetection> {
        let mut claimed: HashSet<u64> = HashSet::with_capacity(detections.len());
        let mut tagged = Vec::with_capacity(detections.len());

        for detection in detections {
            let nearest = self
                .tracks
                .values()
                .filter(|track| !claimed.contains(&track.id))
                .map(|track| (track.id, track.distance_to(detection.center)))
                .filter(|&(_, distance)| distance < self.config.max_distance)
                .fold(None, |best: Option<(u64, f64)>, candidate| match best {
                    Some((_, best_distance)) if best_distance <= candidate.1 => best,
                    _ => Some(candidate),
                });

            let track_id = match nearest {
                Some((id, _)) => {
                    if let Some(track) = self.tracks.get_mut(&id) {
                        track.center = detection.center;
                        track.bbox = detection.bbox;
                        track.last_seen = now;
                    }
                    id
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.tracks.insert(
                        id,
                        Track {
                            id,
                            center: detection.center,
                            bbox: detection.bbox,
                            last_seen: now,
                        },
                    );
                    debug!("New track {} at ({:.1}, {:.1})", id, detection.center.0, detection.center.1);
                    id
                }
            };

            claimed.insert(track_id);
            self.total_detections += 1;
            tagged.push(TrackedDetection {
                track_id,
                detection,
            });
        }

        tagged
    }

    /// Drops every track unseen for longer than the eviction window.
    pub fn cleanup(&mut self, now: Instant) {
        let window = self.config.eviction_window;
        let before = self.tracks.len();
        self.tracks
            .retain(|_, track| now.saturating_duration_since(track.last_seen) <= window);
        let evicted = before - self.tracks.len();
        if evicted > 0 {
            debug!("Evicted {} stale tracks, {} live", evicted, self.tracks.len());
        }
    }

    pub fn live_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn live_track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            total_detections: self.total_detections,
            live_tracks: self.tracks.len(),
            tracks_created: self.next_id,
        }
    }
}
