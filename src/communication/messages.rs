// communication/messages.rs
use crate::shared_data::{
    current_timestamp, Direction, Recommendation, SignalPhase, SignalStatus, TrafficSummary,
};
use serde::{Deserialize, Serialize};

/// Messages the engine hands to downstream consumers (dashboards, loggers,
/// other intersections). Serialized as tagged JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    StatusUpdate {
        timestamp: u64,
        active_direction: Option<Direction>,
        phase: SignalPhase,
        remaining_secs: f64,
        cycle_count: u64,
        traffic: TrafficSummary,
    },
    PhaseChanged {
        timestamp: u64,
        direction: Direction,
        phase: SignalPhase,
        cycle_count: u64,
    },
    Recommendation(Recommendation),
}

impl SignalMessage {
    pub fn status(status: &SignalStatus, traffic: &TrafficSummary) -> Self {
        SignalMessage::StatusUpdate {
            timestamp: current_timestamp(),
            active_direction: status.active_direction,
            phase: status.phase,
            remaining_secs: status.remaining.as_secs_f64(),
            cycle_count: status.cycle_count,
            traffic: traffic.clone(),
        }
    }

    /// Emitted when `current` shows a different direction or phase than
    /// `previous`.
    pub fn phase_change(previous: Option<&SignalStatus>, current: &SignalStatus) -> Option<Self> {
        let direction = current.active_direction?;
        let changed = previous.map_or(true, |prev| {
            prev.active_direction != current.active_direction || prev.phase != current.phase
        });
        changed.then(|| SignalMessage::PhaseChanged {
            timestamp: current_timestamp(),
            direction,
            phase: current.phase,
            cycle_count: current.cycle_count,
        })
    }

    /// Queue the message is routed to.
    pub fn routing_key(&self) -> &'static str {
        match self {
            SignalMessage::Recommendation(_) => crate::global_variables::QUEUE_RECOMMENDATIONS,
            _ => crate::global_variables::QUEUE_SIGNAL_STATUS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn status(direction: Direction, phase: SignalPhase) -> SignalStatus {
        SignalStatus {
            active_direction: Some(direction),
            phase,
            remaining: Duration::from_millis(2500),
            cycle_count: 3,
        }
    }

    #[test]
    fn status_update_serializes_with_tag() {
        let msg = SignalMessage::status(&status(Direction::East, SignalPhase::Green), &TrafficSummary::new());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "status_update");
        assert_eq!(json["active_direction"], "EAST");
        assert_eq!(json["remaining_secs"], 2.5);
        assert_eq!(msg.routing_key(), "signal_status");
    }

    #[test]
    fn phase_change_only_on_transition() {
        let green = status(Direction::North, SignalPhase::Green);
        let yellow = status(Direction::North, SignalPhase::Yellow);
        assert!(SignalMessage::phase_change(None, &green).is_some());
        assert!(SignalMessage::phase_change(Some(&green), &green).is_none());
        assert!(matches!(
            SignalMessage::phase_change(Some(&green), &yellow),
            Some(SignalMessage::PhaseChanged { phase: SignalPhase::Yellow, .. })
        ));
    }
}
