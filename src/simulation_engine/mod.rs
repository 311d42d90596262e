// simulation_engine/mod.rs
pub mod replay;
pub mod synthetic;

pub use replay::{load_recording, parse_recording, RecordedFrame, ReplayDetector, ReplaySource};
pub use synthetic::SyntheticTraffic;
