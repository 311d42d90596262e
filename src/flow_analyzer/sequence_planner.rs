use crate::error::{Result, SignalError};
use crate::shared_data::{Direction, TrafficSummary};
use std::cmp::Reverse;

/// Orders the directions present in `summary` for the next rotation.
///
/// Sort key: density severity (descending), then vehicle count (descending),
/// then the fixed North, South, East, West order.
pub fn plan(summary: &TrafficSummary) -> Result<Vec<Direction>> {
    if summary.is_empty() {
        return Err(SignalError::EmptySummary);
    }

    let mut ranked: Vec<_> = summary.iter().collect();
    ranked.sort_by_key(|(direction, traffic)| {
        (
            Reverse(traffic.density.severity_rank()),
            Reverse(traffic.count),
            **direction,
        )
    });

    Ok(ranked.into_iter().map(|(direction, _)| *direction).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_data::{DensityLevel, DirectionTraffic};

    fn summary(entries: &[(Direction, DensityLevel, usize)]) -> TrafficSummary {
        entries
            .iter()
            .map(|&(d, level, count)| (d, DirectionTraffic::new(count, level)))
            .collect()
    }

    #[test]
    fn orders_by_severity_first() {
        let s = summary(&[
            (Direction::North, DensityLevel::Critical, 30),
            (Direction::South, DensityLevel::Low, 2),
            (Direction::East, DensityLevel::High, 10),
            (Direction::West, DensityLevel::Medium, 8),
        ]);
        assert_eq!(
            plan(&s).unwrap(),
            vec![Direction::North, Direction::East, Direction::West, Direction::South]
        );
    }

    #[test]
    fn level_ties_are_broken_by_count() {
        let s = summary(&[
            (Direction::North, DensityLevel::Medium, 7),
            (Direction::West, DensityLevel::Medium, 12),
            (Direction::South, DensityLevel::Low, 1),
        ]);
        assert_eq!(
            plan(&s).unwrap(),
            vec![Direction::West, Direction::North, Direction::South]
        );
    }

    #[test]
    fn full_ties_follow_fixed_direction_order() {
        let s = summary(&[
            (Direction::West, DensityLevel::High, 20),
            (Direction::East, DensityLevel::High, 20),
            (Direction::South, DensityLevel::High, 20),
            (Direction::North, DensityLevel::High, 20),
        ]);
        assert_eq!(
            plan(&s).unwrap(),
            vec![Direction::North, Direction::South, Direction::East, Direction::West]
        );
    }

    #[test]
    fn partial_summary_plans_only_present_directions() {
        let s = summary(&[(Direction::East, DensityLevel::Low, 0)]);
        assert_eq!(plan(&s).unwrap(), vec![Direction::East]);
    }

    #[test]
    fn empty_summary_is_rejected() {
        assert!(matches!(
            plan(&TrafficSummary::new()),
            Err(SignalError::EmptySummary)
        ));
    }

    #[test]
    fn plan_is_idempotent() {
        let s = summary(&[
            (Direction::North, DensityLevel::Low, 3),
            (Direction::South, DensityLevel::Critical, 40),
        ]);
        assert_eq!(plan(&s).unwrap(), plan(&s).unwrap());
    }
}
