pub mod detector;
pub mod tracker;
pub mod zones;

pub use detector::{detect_with_timeout, validate_detections, FrameMeta, FrameSource, VehicleDetector};
pub use tracker::{Track, Tracker, TrackerConfig, TrackerStats};
pub use zones::IntersectionZones;
