// control_system/traffic_light_controller.rs
//
// Phase machine for one intersection. Exactly one approach is non-RED at a
// time. It runs GREEN for a density-dependent time, then YELLOW for a fixed
// time, then goes RED while the next approach is chosen from the latest
// traffic. Every transition happens inside a single `&mut self` call, so the
// controller is always at a consistent phase boundary between calls.

use crate::config::{SignalConfig, SystemConfig};
use crate::error::{Result, SignalError};
use crate::flow_analyzer::sequence_planner::plan;
use crate::shared_data::{
    DensityLevel, Direction, DirectionTraffic, SignalPhase, SignalStatus, TrafficSummary,
};
use log::{debug, info};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One finished GREEN or YELLOW interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRecord {
    /// Monotonic sequence number, unique per controller.
    pub sequence: u64,
    /// Cycle count at the time the phase ended.
    pub cycle: u64,
    pub direction: Direction,
    pub phase: SignalPhase,
    pub density: DensityLevel,
    pub planned: Duration,
    pub actual: Duration,
    /// Ended early by `force_next_signal`.
    pub forced: bool,
}

#[derive(Debug, Clone)]
struct ActivePhase {
    direction: Direction,
    phase: SignalPhase,
    density: DensityLevel,
    started_at: Instant,
    duration: Duration,
}

#[derive(Debug, Clone)]
pub struct SignalController {
    config: SignalConfig,
    directions: Vec<Direction>,
    active: Option<ActivePhase>,
    latest_traffic: TrafficSummary,
    cycle_count: u64,
    history: VecDeque<PhaseRecord>,
    history_capacity: usize,
    next_sequence: u64,
}

impl SignalController {
    /// Controller serving all four approaches.
    pub fn new(config: SignalConfig, history_capacity: usize) -> Self {
        Self {
            config,
            directions: Direction::ALL.to_vec(),
            active: None,
            latest_traffic: TrafficSummary::new(),
            cycle_count: 0,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity: history_capacity.max(1),
            next_sequence: 0,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(config.signal.clone(), config.phase_history_capacity)
    }

    /// Controller for an intersection with fewer approaches (e.g. a T-junction).
    pub fn with_directions(
        config: SignalConfig,
        directions: &[Direction],
        history_capacity: usize,
    ) -> Result<Self> {
        let mut served: Vec<Direction> = directions.to_vec();
        served.sort();
        served.dedup();
        if served.is_empty() {
            return Err(SignalError::InvalidConfig(
                "a controller must serve at least one direction".to_string(),
            ));
        }
        let mut controller = Self::new(config, history_capacity);
        controller.directions = served;
        Ok(controller)
    }

    /// Advances the phase machine with the latest traffic observation.
    ///
    /// Served directions missing from `summary` count as unobserved LOW traffic.
    /// At most one transition happens per call.
    pub fn update(&mut self, summary: &TrafficSummary, now: Instant) -> SignalStatus {
        self.latest_traffic = self.complete(summary);

        match self.active.as_ref().map(|a| (a.phase, a.direction, elapsed(a, now) >= a.duration)) {
            None => {
                let first = self.select_next(None);
                self.start_green(first, now);
            }
            Some((SignalPhase::Green, _, true)) => self.start_yellow(now),
            Some((SignalPhase::Yellow, finished, true)) => {
                self.finish_active(now, false);
                let next = self.select_next(Some(finished));
                self.start_green(next, now);
            }
            Some(_) => {}
        }

        self.status(now)
    }

    /// Ends the current phase immediately and hands right-of-way to the next
    /// direction. Skips any remaining green or yellow time, including time
    /// protected by the minimum-green clamp.
    pub fn force_next_signal(&mut self, now: Instant) -> SignalStatus {
        let finished = self.active.as_ref().map(|a| a.direction);
        if finished.is_some() {
            self.finish_active(now, true);
        }
        if self.latest_traffic.is_empty() {
            self.latest_traffic = self.complete(&TrafficSummary::new());
        }
        let next = self.select_next(finished);
        info!("Manual override: advancing to {}", next);
        self.start_green(next, now);
        self.status(now)
    }

    pub fn status(&self, now: Instant) -> SignalStatus {
        match &self.active {
            Some(active) => SignalStatus {
                active_direction: Some(active.direction),
                phase: active.phase,
                remaining: active.duration.saturating_sub(elapsed(active, now)),
                cycle_count: self.cycle_count,
            },
            None => SignalStatus {
                active_direction: None,
                phase: SignalPhase::Red,
                remaining: Duration::ZERO,
                cycle_count: self.cycle_count,
            },
        }
    }

    /// Phase currently shown to `direction`. Every non-active direction is RED.
    pub fn phase_of(&self, direction: Direction) -> SignalPhase {
        match &self.active {
            Some(active) if active.direction == direction => active.phase,
            _ => SignalPhase::Red,
        }
    }

    pub fn active_direction(&self) -> Option<Direction> {
        self.active.as_ref().map(|a| a.direction)
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    pub fn history(&self) -> impl Iterator<Item = &PhaseRecord> {
        self.history.iter()
    }

    /// Records with a sequence number at or after `sequence`, oldest first.
    pub fn history_since(&self, sequence: u64) -> impl Iterator<Item = &PhaseRecord> {
        self.history.iter().filter(move |r| r.sequence >= sequence)
    }

    fn complete(&self, summary: &TrafficSummary) -> TrafficSummary {
        let mut completed = TrafficSummary::new();
        for &direction in &self.directions {
            let traffic = summary.get(&direction).copied().unwrap_or_else(|| {
                debug!("No traffic reported for {}, assuming LOW", direction);
                DirectionTraffic::unobserved()
            });
            completed.insert(direction, traffic);
        }
        completed
    }

    /// Highest-priority direction other than `finished`, unless `finished` is
    /// the only direction served.
    fn select_next(&self, finished: Option<Direction>) -> Direction {
        let order = plan(&self.latest_traffic).unwrap_or_else(|_| self.directions.clone());
        order
            .iter()
            .copied()
            .find(|d| Some(*d) != finished)
            .or_else(|| order.first().copied())
            .unwrap_or(self.directions[0])
    }

    fn density_of(&self, direction: Direction) -> DensityLevel {
        self.latest_traffic
            .get(&direction)
            .map(|t| t.density)
            .unwrap_or(DensityLevel::Low)
    }

    fn start_green(&mut self, direction: Direction, now: Instant) {
        let density = self.density_of(direction);
        let duration = Duration::from_secs(self.config.green_duration(density));
        info!(
            "Signal {} -> GREEN for {}s ({} traffic, cycle {})",
            direction,
            duration.as_secs(),
            density,
            self.cycle_count
        );
        self.active = Some(ActivePhase {
            direction,
            phase: SignalPhase::Green,
            density,
            started_at: now,
            duration,
        });
    }

    fn start_yellow(&mut self, now: Instant) {
        let Some(active) = self.active.clone() else {
            return;
        };
        self.record(&active, now, false);
        let duration = Duration::from_secs(self.config.yellow_duration(active.density));
        info!("Signal {} -> YELLOW for {}s", active.direction, duration.as_secs());
        self.active = Some(ActivePhase {
            phase: SignalPhase::Yellow,
            started_at: now,
            duration,
            ..active
        });
    }

    // The active direction goes RED and the cycle counter advances.
    fn finish_active(&mut self, now: Instant, forced: bool) {
        if let Some(active) = self.active.take() {
            self.cycle_count += 1;
            self.record(&active, now, forced);
            info!(
                "Signal {} -> RED{} (cycle {})",
                active.direction,
                if forced { " (forced)" } else { "" },
                self.cycle_count
            );
        }
    }

    fn record(&mut self, active: &ActivePhase, now: Instant, forced: bool) {
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(PhaseRecord {
            sequence: self.next_sequence,
            cycle: self.cycle_count,
            direction: active.direction,
            phase: active.phase,
            density: active.density,
            planned: active.duration,
            actual: elapsed(active, now),
            forced,
        });
        self.next_sequence += 1;
    }
}

fn elapsed(active: &ActivePhase, now: Instant) -> Duration {
    now.saturating_duration_since(active.started_at)
}
