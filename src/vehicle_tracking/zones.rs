use crate::data_structures::Detection;
use crate::error::{Result, SignalError};
use crate::shared_data::Direction;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Region of the frame that belongs to one approach. Vertices are normalized
/// to `[0, 1]` and scaled to the frame at lookup time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionZone {
    pub direction: Direction,
    pub polygon: Vec<(f64, f64)>,
}

impl DirectionZone {
    fn contains(&self, point: (f64, f64)) -> bool {
        // Even-odd ray casting.
        let (px, py) = point;
        let mut inside = false;
        let mut j = self.polygon.len() - 1;
        for i in 0..self.polygon.len() {
            let (xi, yi) = self.polygon[i];
            let (xj, yj) = self.polygon[j];
            if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// Splits a single overhead camera view into the four approaches.
/// Zones may overlap; the first zone in North, South, East, West order wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectionZones {
    zones: Vec<DirectionZone>,
}

impl Default for IntersectionZones {
    fn default() -> Self {
        let zones = vec![
            DirectionZone {
                direction: Direction::North,
                polygon: vec![(0.3, 0.0), (0.7, 0.0), (0.7, 0.4), (0.3, 0.4)],
            },
            DirectionZone {
                direction: Direction::South,
                polygon: vec![(0.3, 0.6), (0.7, 0.6), (0.7, 1.0), (0.3, 1.0)],
            },
            DirectionZone {
                direction: Direction::East,
                polygon: vec![(0.6, 0.3), (1.0, 0.3), (1.0, 0.7), (0.6, 0.7)],
            },
            DirectionZone {
                direction: Direction::West,
                polygon: vec![(0.0, 0.3), (0.4, 0.3), (0.4, 0.7), (0.0, 0.7)],
            },
        ];
        Self { zones }
    }
}

impl IntersectionZones {
    pub fn from_polygons(polygons: HashMap<Direction, Vec<(f64, f64)>>) -> Result<Self> {
        let mut zones = Vec::with_capacity(polygons.len());
        for direction in Direction::ALL {
            let Some(polygon) = polygons.get(&direction) else {
                continue;
            };
            if polygon.len() < 3 {
                return Err(SignalError::InvalidConfig(format!(
                    "zone for {} needs at least 3 vertices",
                    direction
                )));
            }
            let in_unit_square = polygon
                .iter()
                .all(|&(x, y)| (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y));
            if !in_unit_square {
                return Err(SignalError::InvalidConfig(format!(
                    "zone for {} must use normalized coordinates",
                    direction
                )));
            }
            zones.push(DirectionZone {
                direction,
                polygon: polygon.clone(),
            });
        }
        if zones.is_empty() {
            return Err(SignalError::InvalidConfig(
                "at least one detection zone is required".to_string(),
            ));
        }
        Ok(Self { zones })
    }

    pub fn directions(&self) -> Vec<Direction> {
        self.zones.iter().map(|z| z.direction).collect()
    }

    /// Direction whose zone contains `point` (frame pixels), if any.
    pub fn direction_for(&self, point: (f64, f64), frame_size: (u32, u32)) -> Option<Direction> {
        let (width, height) = frame_size;
        if width == 0 || height == 0 {
            return None;
        }
        let normalized = (point.0 / width as f64, point.1 / height as f64);
        self.zones
            .iter()
            .find(|zone| zone.contains(normalized))
            .map(|zone| zone.direction)
    }

    /// Groups one frame's detections by approach. Detections outside every
    /// zone are dropped; every configured direction gets an entry.
    pub fn partition(
        &self,
        detections: Vec<Detection>,
        frame_size: (u32, u32),
    ) -> BTreeMap<Direction, Vec<Detection>> {
        let mut grouped: BTreeMap<Direction, Vec<Detection>> = self
            .zones
            .iter()
            .map(|zone| (zone.direction, Vec::new()))
            .collect();
        for detection in detections {
            if let Some(direction) = self.direction_for(detection.center, frame_size) {
                grouped.entry(direction).or_default().push(detection);
            }
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{BoundingBox, VehicleClass};

    const FRAME: (u32, u32) = (1000, 1000);

    fn detection_at(cx: f64, cy: f64) -> Detection {
        let bbox = BoundingBox::new(cx - 5.0, cy - 5.0, cx + 5.0, cy + 5.0).unwrap();
        Detection::new(bbox, VehicleClass::Truck, 0.7).unwrap()
    }

    #[test]
    fn default_zones_cover_each_approach() {
        let zones = IntersectionZones::default();
        assert_eq!(zones.direction_for((500.0, 100.0), FRAME), Some(Direction::North));
        assert_eq!(zones.direction_for((500.0, 900.0), FRAME), Some(Direction::South));
        assert_eq!(zones.direction_for((900.0, 500.0), FRAME), Some(Direction::East));
        assert_eq!(zones.direction_for((100.0, 500.0), FRAME), Some(Direction::West));
        assert_eq!(zones.direction_for((50.0, 50.0), FRAME), None);
    }

    #[test]
    fn overlap_resolves_in_direction_order() {
        let zones = IntersectionZones::default();
        // (0.65, 0.35) lies in both the NORTH and EAST quadrilaterals.
        assert_eq!(zones.direction_for((650.0, 350.0), FRAME), Some(Direction::North));
    }

    #[test]
    fn partition_drops_detections_outside_every_zone() {
        let zones = IntersectionZones::default();
        let grouped = zones.partition(
            vec![
                detection_at(500.0, 100.0),
                detection_at(510.0, 120.0),
                detection_at(20.0, 20.0),
                detection_at(900.0, 500.0),
            ],
            FRAME,
        );
        assert_eq!(grouped[&Direction::North].len(), 2);
        assert_eq!(grouped[&Direction::East].len(), 1);
        assert!(grouped[&Direction::South].is_empty());
        assert_eq!(grouped.values().map(Vec::len).sum::<usize>(), 3);
    }

    #[test]
    fn malformed_zone_is_rejected() {
        let mut polygons = HashMap::new();
        polygons.insert(Direction::North, vec![(0.0, 0.0), (1.0, 0.0)]);
        assert!(IntersectionZones::from_polygons(polygons).is_err());

        let mut polygons = HashMap::new();
        polygons.insert(Direction::East, vec![(0.0, 0.0), (2.0, 0.0), (1.0, 1.0)]);
        assert!(IntersectionZones::from_polygons(polygons).is_err());
    }
}
