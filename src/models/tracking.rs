use serde::{Deserialize, Serialize};

/// Position source for a trip session. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingMode {
    Gps,
    Simulation,
    #[default]
    Off,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BatterySample {
    /// Charge level in `0.0..=1.0`.
    pub level: f64,
    pub charging: bool,
}
