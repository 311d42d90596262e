use crate::error::{Result, SignalError};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

/// Vehicle categories the detector is allowed to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Motorcycle,
    Bus,
    Truck,
}

impl VehicleClass {
    /// Maps a COCO class id onto the vehicle taxonomy (2=car, 3=motorcycle,
    /// 5=bus, 7=truck). Every other id is not a vehicle.
    pub fn from_coco_id(class_id: u32) -> Option<Self> {
        match class_id {
            2 => Some(VehicleClass::Car),
            3 => Some(VehicleClass::Motorcycle),
            5 => Some(VehicleClass::Bus),
            7 => Some(VehicleClass::Truck),
            _ => None,
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VehicleClass::Car => "car",
            VehicleClass::Motorcycle => "motorcycle",
            VehicleClass::Bus => "bus",
            VehicleClass::Truck => "truck",
        };
        f.write_str(name)
    }
}

impl FromStr for VehicleClass {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(VehicleClass::Car),
            "motorcycle" => Ok(VehicleClass::Motorcycle),
            "bus" => Ok(VehicleClass::Bus),
            "truck" => Ok(VehicleClass::Truck),
            _ => Err(SignalError::UnknownVehicleClass(s.to_string())),
        }
    }
}

/// Axis-aligned box in frame-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Builds a box, rejecting non-finite coordinates and empty or inverted extents.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(SignalError::InvalidDetection(format!(
                "non-finite bounding box ({}, {}, {}, {})",
                x1, y1, x2, y2
            )));
        }
        if x1 >= x2 || y1 >= y2 {
            return Err(SignalError::InvalidDetection(format!(
                "degenerate bounding box ({}, {}, {}, {})",
                x1, y1, x2, y2
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// A detection exactly as the external detector reports it, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// `[x1, y1, x2, y2]` in frame pixels.
    pub bbox: [f64; 4],
    /// Class label, e.g. "car".
    pub class: String,
    pub confidence: f32,
}

/// A validated, immutable detection for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class: VehicleClass,
    pub confidence: f32,
    /// Center of `bbox`, derived once at construction.
    pub center: (f64, f64),
}

impl Detection {
    pub fn new(bbox: BoundingBox, class: VehicleClass, confidence: f32) -> Result<Self> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(SignalError::InvalidDetection(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }
        Ok(Self {
            center: bbox.center(),
            bbox,
            class,
            confidence,
        })
    }
}

impl TryFrom<RawDetection> for Detection {
    type Error = SignalError;

    fn try_from(raw: RawDetection) -> Result<Self> {
        let [x1, y1, x2, y2] = raw.bbox;
        let bbox = BoundingBox::new(x1, y1, x2, y2)?;
        let class = raw.class.parse::<VehicleClass>()?;
        Detection::new(bbox, class, raw.confidence)
    }
}

/// A detection tagged with the identity of the track it was assigned to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedDetection {
    pub track_id: u64,
    pub detection: Detection,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(bbox: [f64; 4], class: &str, confidence: f32) -> RawDetection {
        RawDetection {
            bbox,
            class: class.to_string(),
            confidence,
        }
    }

    #[test]
    fn valid_raw_detection_gets_a_center() {
        let det = Detection::try_from(raw([90.0, 80.0, 110.0, 120.0], "car", 0.9)).unwrap();
        assert_eq!(det.center, (100.0, 100.0));
        assert_eq!(det.class, VehicleClass::Car);
    }

    #[test]
    fn malformed_boxes_are_rejected() {
        let nan = Detection::try_from(raw([f64::NAN, 0.0, 10.0, 10.0], "car", 0.9));
        assert!(matches!(nan, Err(SignalError::InvalidDetection(_))));

        let inverted = Detection::try_from(raw([10.0, 0.0, 5.0, 10.0], "bus", 0.9));
        assert!(matches!(inverted, Err(SignalError::InvalidDetection(_))));

        let flat = Detection::try_from(raw([0.0, 10.0, 5.0, 10.0], "bus", 0.9));
        assert!(matches!(flat, Err(SignalError::InvalidDetection(_))));
    }

    #[test]
    fn confidence_and_class_are_checked() {
        let too_confident = Detection::try_from(raw([0.0, 0.0, 5.0, 5.0], "truck", 1.5));
        assert!(matches!(too_confident, Err(SignalError::InvalidDetection(_))));

        let pedestrian = Detection::try_from(raw([0.0, 0.0, 5.0, 5.0], "person", 0.8));
        assert!(matches!(pedestrian, Err(SignalError::UnknownVehicleClass(_))));
    }

    #[test]
    fn coco_ids_map_onto_vehicle_taxonomy() {
        assert_eq!(VehicleClass::from_coco_id(3), Some(VehicleClass::Motorcycle));
        assert_eq!(VehicleClass::from_coco_id(7), Some(VehicleClass::Truck));
        assert_eq!(VehicleClass::from_coco_id(0), None);
    }
}
