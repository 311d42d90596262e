use crate::config::SignalConfig;
use crate::control_system::traffic_light_controller::SignalController;
use crate::error::{Result, SignalError};
use crate::flow_analyzer::density::DensityThresholds;
use crate::flow_analyzer::sequence_planner::plan;
use crate::shared_data::{
    current_timestamp, DensityLevel, Direction, DirectionRecommendation, DirectionTraffic,
    Recommendation, TrafficSummary,
};
use log::info;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Per-direction observation as it arrives from outside the engine, e.g. the
/// batch binary's JSON input. Validated by `parse_summary`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDirectionTraffic {
    /// Vehicle count, or an average count over several frames.
    pub count: f64,
    /// Density label; classified from `count` when absent.
    #[serde(default)]
    pub density: Option<String>,
}

/// Turns raw per-direction observations into a validated summary. Unknown
/// direction keys, unknown density labels and negative counts are rejected, as
/// are two keys naming the same direction ("north" and "N").
/// Averages are truncated, as for a batch of frames.
pub fn parse_summary(
    raw: &HashMap<String, RawDirectionTraffic>,
    thresholds: &DensityThresholds,
) -> Result<TrafficSummary> {
    let mut summary = TrafficSummary::new();
    for (key, observed) in raw {
        let direction: Direction = key.parse()?;
        if !observed.count.is_finite() || observed.count < 0.0 {
            return Err(SignalError::NegativeCount {
                direction,
                count: observed.count,
            });
        }
        let count = observed.count.trunc() as usize;
        let density = match &observed.density {
            Some(label) => label.parse::<DensityLevel>()?,
            None => thresholds.classify(count),
        };
        if summary
            .insert(direction, DirectionTraffic::new(count, density))
            .is_some()
        {
            return Err(SignalError::DuplicateDirection(direction));
        }
    }
    Ok(summary)
}

/// Packages timing and ordering for every direction present in `summary`.
///
/// When a live controller is attached it is updated exactly once, after all
/// directions are known, and its status is included.
pub fn aggregate(
    summary: &TrafficSummary,
    signal: &SignalConfig,
    controller: Option<(&mut SignalController, Instant)>,
) -> Result<Recommendation> {
    let optimal_sequence = plan(summary)?;

    let directions: BTreeMap<Direction, DirectionRecommendation> = summary
        .iter()
        .map(|(&direction, traffic)| {
            let green = signal.green_duration(traffic.density);
            let yellow = signal.yellow_duration(traffic.density);
            (
                direction,
                DirectionRecommendation {
                    density_level: traffic.density,
                    vehicle_count: traffic.count,
                    green_duration: green,
                    yellow_duration: yellow,
                    total_duration: green + yellow,
                },
            )
        })
        .collect();

    let signal_status = controller.map(|(ctrl, now)| ctrl.update(summary, now));

    info!(
        "Recommendation for {} directions, sequence {:?}",
        directions.len(),
        optimal_sequence
    );

    Ok(Recommendation {
        timestamp: current_timestamp(),
        directions,
        optimal_sequence,
        signal_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_analyzer::density::classify;
    use crate::shared_data::SignalPhase;
    use std::time::Duration;

    fn counted(counts: &[(Direction, usize)]) -> TrafficSummary {
        counts
            .iter()
            .map(|&(d, count)| (d, DirectionTraffic::new(count, classify(count))))
            .collect()
    }

    #[test]
    fn end_to_end_counts_to_recommendation() {
        let summary = counted(&[
            (Direction::North, 28),
            (Direction::South, 3),
            (Direction::East, 18),
            (Direction::West, 9),
        ]);
        let signal = SignalConfig::default();
        let rec = aggregate(&summary, &signal, None).unwrap();

        assert_eq!(rec.directions[&Direction::North].density_level, DensityLevel::Critical);
        assert_eq!(rec.directions[&Direction::South].density_level, DensityLevel::Low);
        assert_eq!(rec.directions[&Direction::East].density_level, DensityLevel::High);
        assert_eq!(rec.directions[&Direction::West].density_level, DensityLevel::Medium);
        assert_eq!(
            rec.optimal_sequence,
            vec![Direction::North, Direction::East, Direction::West, Direction::South]
        );
        assert_eq!(
            rec.directions[&Direction::North].green_duration,
            signal.timings.critical.green
        );
        assert_eq!(rec.directions[&Direction::North].total_duration, 63);
        assert!(rec.signal_status.is_none());
    }

    #[test]
    fn partial_input_only_covers_present_directions() {
        let summary = counted(&[(Direction::West, 12)]);
        let rec = aggregate(&summary, &SignalConfig::default(), None).unwrap();
        assert_eq!(rec.directions.len(), 1);
        assert_eq!(rec.optimal_sequence, vec![Direction::West]);
    }

    #[test]
    fn attached_controller_is_updated_once() {
        let summary = counted(&[(Direction::South, 30), (Direction::East, 2)]);
        let mut ctrl = SignalController::new(SignalConfig::default(), 8);
        let now = Instant::now();
        let rec = aggregate(&summary, &SignalConfig::default(), Some((&mut ctrl, now))).unwrap();

        let status = rec.signal_status.unwrap();
        assert_eq!(status.active_direction, Some(Direction::South));
        assert_eq!(status.phase, SignalPhase::Green);
        assert_eq!(status.remaining, Duration::from_secs(60));
        assert!(ctrl.history().next().is_none());
    }

    #[test]
    fn empty_input_is_rejected() {
        let result = aggregate(&TrafficSummary::new(), &SignalConfig::default(), None);
        assert!(matches!(result, Err(SignalError::EmptySummary)));
    }

    #[test]
    fn raw_observations_are_validated() {
        let thresholds = DensityThresholds::default();

        let mut raw = HashMap::new();
        raw.insert(
            "north".to_string(),
            RawDirectionTraffic { count: 17.6, density: None },
        );
        raw.insert(
            "EAST".to_string(),
            RawDirectionTraffic { count: 2.0, density: Some("critical".to_string()) },
        );
        let summary = parse_summary(&raw, &thresholds).unwrap();
        assert_eq!(summary[&Direction::North], DirectionTraffic::new(17, DensityLevel::High));
        assert_eq!(summary[&Direction::East].density, DensityLevel::Critical);

        let mut negative = HashMap::new();
        negative.insert("SOUTH".to_string(), RawDirectionTraffic { count: -1.0, density: None });
        assert!(matches!(
            parse_summary(&negative, &thresholds),
            Err(SignalError::NegativeCount { .. })
        ));

        let mut unknown = HashMap::new();
        unknown.insert("UPWARD".to_string(), RawDirectionTraffic { count: 1.0, density: None });
        assert!(matches!(
            parse_summary(&unknown, &thresholds),
            Err(SignalError::UnknownDirection(_))
        ));

        let mut bad_level = HashMap::new();
        bad_level.insert(
            "WEST".to_string(),
            RawDirectionTraffic { count: 1.0, density: Some("gridlock".to_string()) },
        );
        assert!(matches!(
            parse_summary(&bad_level, &thresholds),
            Err(SignalError::UnknownDensityLevel(_))
        ));
    }

    #[test]
    fn aliased_direction_keys_are_rejected() {
        let mut raw = HashMap::new();
        raw.insert("north".to_string(), RawDirectionTraffic { count: 30.0, density: None });
        raw.insert("NORTH".to_string(), RawDirectionTraffic { count: 1.0, density: None });
        assert!(matches!(
            parse_summary(&raw, &DensityThresholds::default()),
            Err(SignalError::DuplicateDirection(Direction::North))
        ));

        let mut short = HashMap::new();
        short.insert("W".to_string(), RawDirectionTraffic { count: 3.0, density: None });
        short.insert("west".to_string(), RawDirectionTraffic { count: 3.0, density: None });
        assert!(matches!(
            parse_summary(&short, &DensityThresholds::default()),
            Err(SignalError::DuplicateDirection(Direction::West))
        ));
    }
}
