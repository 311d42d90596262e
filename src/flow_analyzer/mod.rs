pub mod aggregator;
pub mod density;
pub mod sequence_planner;

// Re-export the items callers reach for most
pub use aggregator::{aggregate, parse_summary, RawDirectionTraffic};
pub use density::{classify, classify_with, DensityThresholds};
pub use sequence_planner::plan;
