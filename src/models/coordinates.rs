use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed geographic point, e.g. a pickup or drop-off location.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// One raw position sample as produced by a device or the simulator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RawFix {
    pub lat: f64,
    pub lng: f64,
    pub heading: Option<f64>,
    /// Meters per second.
    pub speed: Option<f64>,
}

/// A timestamped fix. A sequence ordered by `captured_at` forms a trip's path history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

impl Coordinates {
    pub fn from_fix(fix: RawFix, captured_at: DateTime<Utc>) -> Self {
        Self {
            lat: fix.lat,
            lng: fix.lng,
            heading: fix.heading,
            speed: fix.speed.map(|speed| speed.max(0.0)),
            captured_at,
        }
    }

    /// A stationary sample at a fixed point.
    pub fn at(point: GeoPoint, captured_at: DateTime<Utc>) -> Self {
        Self {
            lat: point.lat,
            lng: point.lng,
            heading: None,
            speed: Some(0.0),
            captured_at,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lng: self.lng,
        }
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed.unwrap_or(0.0) * 3.6
    }
}
