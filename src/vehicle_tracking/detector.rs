// vehicle_tracking/detector.rs
//
// Seams to the external collaborators: the object detector and whatever
// decodes frames. The engine never looks inside a frame; it only needs the
// frame's pixel size to place detections in zones.

use crate::data_structures::{Detection, RawDetection};
use crate::error::{Result, SignalError};
use log::debug;
use std::convert::TryFrom;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task;
use tokio::time::timeout;

/// The little the engine needs to know about a frame.
pub trait FrameMeta {
    /// `(width, height)` in pixels.
    fn frame_size(&self) -> (u32, u32);

    /// Capture time relative to the start of the stream, when the source
    /// knows it (recorded video). Live sources leave this to the wall clock.
    fn captured_at(&self) -> Option<Duration> {
        None
    }
}

/// Frame-local vehicle detector. May block for a full inference pass and may
/// return an empty list.
pub trait VehicleDetector: Send + 'static {
    type Frame: FrameMeta + Send + 'static;

    fn detect(&mut self, frame: &Self::Frame) -> Result<Vec<RawDetection>>;
}

/// Yields frames until the source is exhausted (`Ok(None)`).
pub trait FrameSource: Send {
    type Frame;

    fn next_frame(&mut self) -> Result<Option<Self::Frame>>;
}

/// Runs one detector call on the blocking pool, bounded by `limit`.
///
/// A call that overruns is abandoned and reported as `DetectorTimeout`; the
/// detector stays locked by the stuck call, so the caller must not reuse it.
pub async fn detect_with_timeout<D: VehicleDetector>(
    detector: &Arc<Mutex<D>>,
    frame: D::Frame,
    limit: Duration,
) -> Result<Vec<RawDetection>> {
    let detector = Arc::clone(detector);
    let handle = task::spawn_blocking(move || {
        let mut guard = detector
            .lock()
            .map_err(|_| SignalError::Detector("detector lock poisoned".to_string()))?;
        guard.detect(&frame)
    });

    match timeout(limit, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(SignalError::Detector(format!(
            "detector task aborted: {}",
            join_error
        ))),
        Err(_) => Err(SignalError::DetectorTimeout { timeout: limit }),
    }
}

/// Validates raw detector output and drops low-confidence detections.
/// A single malformed detection rejects the whole frame.
pub fn validate_detections(raw: Vec<RawDetection>, min_confidence: f32) -> Result<Vec<Detection>> {
    let total = raw.len();
    let mut accepted = Vec::with_capacity(total);
    for candidate in raw {
        let detection = Detection::try_from(candidate)?;
        if detection.confidence >= min_confidence {
            accepted.push(detection);
        }
    }
    if accepted.len() < total {
        debug!(
            "Dropped {} of {} detections below confidence {:.2}",
            total - accepted.len(),
            total,
            min_confidence
        );
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank;

    impl FrameMeta for Blank {
        fn frame_size(&self) -> (u32, u32) {
            (640, 480)
        }
    }

    struct SlowDetector {
        delay: Duration,
    }

    impl VehicleDetector for SlowDetector {
        type Frame = Blank;

        fn detect(&mut self, _frame: &Blank) -> Result<Vec<RawDetection>> {
            std::thread::sleep(self.delay);
            Ok(vec![RawDetection {
                bbox: [0.0, 0.0, 10.0, 10.0],
                class: "car".to_string(),
                confidence: 0.9,
            }])
        }
    }

    struct BrokenDetector;

    impl VehicleDetector for BrokenDetector {
        type Frame = Blank;

        fn detect(&mut self, _frame: &Blank) -> Result<Vec<RawDetection>> {
            Err(SignalError::Detector("model not loaded".to_string()))
        }
    }

    fn raw(confidence: f32) -> RawDetection {
        RawDetection {
            bbox: [10.0, 10.0, 40.0, 30.0],
            class: "car".to_string(),
            confidence,
        }
    }

    #[test]
    fn low_confidence_detections_are_dropped() {
        let kept = validate_detections(vec![raw(0.9), raw(0.2), raw(0.4)], 0.4).unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn malformed_detection_rejects_the_frame() {
        let mut bad = raw(0.9);
        bad.bbox = [10.0, 10.0, f64::INFINITY, 30.0];
        assert!(matches!(
            validate_detections(vec![raw(0.9), bad], 0.4),
            Err(SignalError::InvalidDetection(_))
        ));
    }

    #[tokio::test]
    async fn fast_detector_answers() {
        let detector = Arc::new(Mutex::new(SlowDetector {
            delay: Duration::from_millis(1),
        }));
        let found = detect_with_timeout(&detector, Blank, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn hung_detector_times_out() {
        let detector = Arc::new(Mutex::new(SlowDetector {
            delay: Duration::from_millis(500),
        }));
        let result = detect_with_timeout(&detector, Blank, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(SignalError::DetectorTimeout { .. })));
    }

    #[tokio::test]
    async fn detector_failure_is_surfaced() {
        let detector = Arc::new(Mutex::new(BrokenDetector));
        let result = detect_with_timeout(&detector, Blank, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(SignalError::Detector(_))));
    }
}
