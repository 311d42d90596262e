// simulation_engine/replay.rs

use crate::data_structures::RawDetection;
use crate::error::{Result, SignalError};
use crate::shared_data::Direction;
use crate::vehicle_tracking::detector::{FrameMeta, FrameSource, VehicleDetector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// A frame whose detector output was captured ahead of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub width: u32,
    pub height: u32,
    /// Milliseconds since the start of the recording.
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

impl FrameMeta for RecordedFrame {
    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn captured_at(&self) -> Option<Duration> {
        self.timestamp_ms.map(Duration::from_millis)
    }
}

pub struct ReplaySource {
    frames: VecDeque<RecordedFrame>,
}

impl ReplaySource {
    pub fn new(frames: Vec<RecordedFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameSource for ReplaySource {
    type Frame = RecordedFrame;

    fn next_frame(&mut self) -> Result<Option<RecordedFrame>> {
        Ok(self.frames.pop_front())
    }
}

/// Hands back whatever the frame recorded. Stateless, so every direction can
/// own its own instance for free.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayDetector;

impl VehicleDetector for ReplayDetector {
    type Frame = RecordedFrame;

    fn detect(&mut self, frame: &RecordedFrame) -> Result<Vec<RawDetection>> {
        Ok(frame.detections.clone())
    }
}

/// Loads a recording: a JSON object mapping direction names to frame lists.
/// Direction keys are validated; two keys naming the same direction are an
/// error.
pub fn load_recording<P: AsRef<Path>>(path: P) -> Result<BTreeMap<Direction, Vec<RecordedFrame>>> {
    let contents = fs::read_to_string(path)?;
    parse_recording(&contents)
}

pub fn parse_recording(contents: &str) -> Result<BTreeMap<Direction, Vec<RecordedFrame>>> {
    let raw: HashMap<String, Vec<RecordedFrame>> = serde_json::from_str(contents)?;
    let mut recording = BTreeMap::new();
    for (key, frames) in raw {
        let direction = key.parse::<Direction>()?;
        if recording.insert(direction, frames).is_some() {
            return Err(SignalError::DuplicateDirection(direction));
        }
    }
    Ok(recording)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_parses_and_replays() {
        let json = r#"{
            "NORTH": [
                { "width": 640, "height": 480, "timestamp_ms": 0,
                  "detections": [ { "bbox": [1, 2, 30, 40], "class": "bus", "confidence": 0.8 } ] },
                { "width": 640, "height": 480 }
            ]
        }"#;
        let recording = parse_recording(json).unwrap();
        let frames = recording[&Direction::North].clone();
        assert_eq!(frames[0].captured_at(), Some(Duration::ZERO));
        assert_eq!(frames[1].captured_at(), None);

        let mut source = ReplaySource::new(frames);
        let mut detector = ReplayDetector;
        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(detector.detect(&first).unwrap().len(), 1);
        let second = source.next_frame().unwrap().unwrap();
        assert!(detector.detect(&second).unwrap().is_empty());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn unknown_direction_key_is_rejected() {
        let json = r#"{ "NORTHEAST": [] }"#;
        assert!(matches!(
            parse_recording(json),
            Err(SignalError::UnknownDirection(_))
        ));
    }

    #[test]
    fn same_direction_under_two_keys_is_rejected() {
        let json = r#"{
            "south": [ { "width": 640, "height": 480 } ],
            "S": [ { "width": 640, "height": 480 } ]
        }"#;
        assert!(matches!(
            parse_recording(json),
            Err(SignalError::DuplicateDirection(Direction::South))
        ));
    }
}
