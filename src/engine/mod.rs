// engine/mod.rs
pub mod batch;
pub mod live;

pub use batch::{analyze_batch, process_direction, BatchReport, DirectionInput, DirectionResult};
pub use live::{run_live, FrameOutcome, LiveOptions, LiveReport, StopReason};
