// simulation_engine/synthetic.rs
//
// Stand-in for a camera plus detector when no model is available: vehicles
// arrive on each approach at a configurable rate and drive toward the middle
// of the frame, and the "detections" are their boxes with a little jitter.

use crate::data_structures::{RawDetection, VehicleClass};
use crate::error::Result;
use crate::shared_data::Direction;
use crate::simulation_engine::replay::RecordedFrame;
use crate::vehicle_tracking::detector::FrameSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

const VEHICLE_SIZE: f64 = 0.04; // fraction of the frame
const APPROACH_LENGTH: f64 = 0.4;
const MIN_GAP: f64 = 0.05;
const CLASSES: [VehicleClass; 4] = [
    VehicleClass::Car,
    VehicleClass::Motorcycle,
    VehicleClass::Bus,
    VehicleClass::Truck,
];

#[derive(Debug, Clone)]
struct SimVehicle {
    direction: Direction,
    /// Distance travelled along the approach; the vehicle leaves the frame's
    /// zone near `APPROACH_LENGTH`.
    progress: f64,
    speed: f64,
    class: VehicleClass,
}

impl SimVehicle {
    // Normalized center of the vehicle for its approach lane.
    fn center(&self) -> (f64, f64) {
        match self.direction {
            Direction::North => (0.45, self.progress),
            Direction::South => (0.55, 1.0 - self.progress),
            Direction::East => (1.0 - self.progress, 0.45),
            Direction::West => (self.progress, 0.55),
        }
    }
}

pub struct SyntheticTraffic {
    rng: StdRng,
    width: u32,
    height: u32,
    /// Per-frame arrival probability for each approach.
    arrival_rates: BTreeMap<Direction, f64>,
    vehicles: Vec<SimVehicle>,
    frame_limit: Option<usize>,
    frames_emitted: usize,
}

impl SyntheticTraffic {
    pub fn new(seed: u64, width: u32, height: u32, arrival_rates: BTreeMap<Direction, f64>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            width,
            height,
            arrival_rates,
            vehicles: Vec::new(),
            frame_limit: None,
            frames_emitted: 0,
        }
    }

    /// Stops the feed after `limit` frames.
    pub fn with_frame_limit(mut self, limit: usize) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    pub fn vehicles_on(&self, direction: Direction) -> usize {
        self.vehicles.iter().filter(|v| v.direction == direction).count()
    }

    fn step(&mut self) {
        for vehicle in &mut self.vehicles {
            vehicle.progress += vehicle.speed;
        }
        self.vehicles
            .retain(|v| v.progress < APPROACH_LENGTH - VEHICLE_SIZE / 2.0);

        for (&direction, &rate) in &self.arrival_rates {
            let lane_clear = self
                .vehicles
                .iter()
                .filter(|v| v.direction == direction)
                .all(|v| v.progress > MIN_GAP);
            if lane_clear && self.rng.random::<f64>() < rate {
                let class = CLASSES[self.rng.random_range(0..CLASSES.len())];
                let speed = self.rng.random_range(0.002..0.008);
                self.vehicles.push(SimVehicle {
                    direction,
                    progress: 0.0,
                    speed,
                    class,
                });
            }
        }
    }

    fn detections(&mut self) -> Vec<RawDetection> {
        let (w, h) = (self.width as f64, self.height as f64);
        let half = VEHICLE_SIZE / 2.0;
        let mut detections = Vec::with_capacity(self.vehicles.len());
        for vehicle in &self.vehicles {
            let (cx, cy) = vehicle.center();
            let jitter_x = self.rng.random_range(-2.0..2.0);
            let jitter_y = self.rng.random_range(-2.0..2.0);
            let x1 = ((cx - half) * w + jitter_x).max(0.0);
            let y1 = ((cy - half) * h + jitter_y).max(0.0);
            detections.push(RawDetection {
                bbox: [x1, y1, x1 + VEHICLE_SIZE * w, y1 + VEHICLE_SIZE * h],
                class: vehicle.class.to_string(),
                confidence: self.rng.random_range(0.5..0.99),
            });
        }
        detections
    }
}

impl FrameSource for SyntheticTraffic {
    type Frame = RecordedFrame;

    fn next_frame(&mut self) -> Result<Option<RecordedFrame>> {
        if let Some(limit) = self.frame_limit {
            if self.frames_emitted >= limit {
                return Ok(None);
            }
        }
        self.step();
        self.frames_emitted += 1;
        Ok(Some(RecordedFrame {
            width: self.width,
            height: self.height,
            timestamp_ms: None,
            detections: self.detections(),
        }))
    }
}
