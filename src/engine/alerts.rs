//! Situational alerts derived from the latest fix, battery and trip state.
//!
//! Evaluation is a pure function of its inputs and the previous alert set, so
//! feeding identical input twice yields the same set.

use crate::geo::haversine_km;
use crate::models::alert::{Alert, AlertSet, Severity};
use crate::models::coordinates::Coordinates;
use crate::models::load::{Load, LoadStatus};
use crate::models::tracking::{BatterySample, TrackingMode};

pub const BATTERY_LOW: &str = "batt-low";
pub const SPEED: &str = "speed";
pub const PROXIMITY_CLOSE: &str = "prox-close";
pub const PROXIMITY_NEAR: &str = "prox-near";
pub const TRAFFIC: &str = "traffic";

const LOW_BATTERY_LEVEL: f64 = 0.20;
const SPEED_LIMIT_KMH: f64 = 80.0;
const CLOSE_RADIUS_KM: f64 = 2.0;
const NEAR_RADIUS_KM: f64 = 10.0;
/// A traffic roll above this raises the alert (about one tick in twenty).
const TRAFFIC_ROLL_THRESHOLD: f64 = 0.95;

pub struct AlertInput<'a> {
    pub load: &'a Load,
    pub position: Option<&'a Coordinates>,
    pub battery: Option<BatterySample>,
    pub mode: TrackingMode,
    /// Uniform sample in `[0, 1)` used for the simulated traffic report.
    pub traffic_roll: f64,
}

pub fn evaluate_alerts(input: &AlertInput<'_>, previous: &AlertSet) -> AlertSet {
    let mut alerts = AlertSet::new();

    if let Some(battery) = input.battery {
        if battery.level < LOW_BATTERY_LEVEL && !battery.charging {
            alerts.insert(Alert::new(
                BATTERY_LOW,
                Severity::Critical,
                "Low Battery: Connect charger to maintain GPS",
                "battery-warning",
            ));
        }
    }

    if let Some(position) = input.position {
        if position.speed_kmh() > SPEED_LIMIT_KMH {
            alerts.insert(Alert::new(
                SPEED,
                Severity::Warning,
                "Speed Warning: Slow down (Limit 80km/h)",
                "siren",
            ));
        }

        if let Some(alert) = proximity_alert(input.load, position) {
            alerts.insert(alert);
        }
    }

    match previous.get(TRAFFIC) {
        Some(traffic) => alerts.insert(traffic.clone()),
        None if input.mode == TrackingMode::Simulation
            && input.traffic_roll > TRAFFIC_ROLL_THRESHOLD =>
        {
            alerts.insert(Alert::new(
                TRAFFIC,
                Severity::Warning,
                "Heavy Traffic reported ahead (+10m delay)",
                "alert-triangle",
            ));
        }
        None => {}
    }

    alerts
}

fn proximity_alert(load: &Load, position: &Coordinates) -> Option<Alert> {
    let (target, label) = if load.status == LoadStatus::Assigned {
        (load.pickup_coordinates?, "Pickup")
    } else {
        (load.drop_coordinates?, "Drop-off")
    };

    let distance = haversine_km(&position.point(), &target);
    if distance < CLOSE_RADIUS_KM {
        Some(Alert::new(
            PROXIMITY_CLOSE,
            Severity::Info,
            format!("Approaching {label} (< 2km)"),
            "map-pin",
        ))
    } else if distance < NEAR_RADIUS_KM {
        Some(Alert::new(
            PROXIMITY_NEAR,
            Severity::Info,
            format!("{label} is nearby ({distance:.1}km)"),
            "navigation",
        ))
    } else {
        None
    }
}
