use serde::Serialize;

use crate::geo::haversine_km;
use crate::models::load::{Load, LoadStatus};

/// Ceiling while the load is still moving; 100 is left for arrival.
pub const IN_TRANSIT_CEILING: f64 = 95.0;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Progress {
    pub percent: f64,
    pub remaining_km: Option<f64>,
}

pub fn compute_progress(load: &Load) -> Progress {
    match load.status {
        LoadStatus::Reached | LoadStatus::Completed => {
            return Progress {
                percent: 100.0,
                remaining_km: Some(0.0),
            };
        }
        LoadStatus::Assigned | LoadStatus::Pending => {
            return Progress {
                percent: 0.0,
                remaining_km: None,
            };
        }
        _ => {}
    }

    let (Some(pickup), Some(drop)) = (load.pickup_coordinates, load.drop_coordinates) else {
        return Progress {
            percent: 0.0,
            remaining_km: None,
        };
    };

    let total = haversine_km(&pickup, &drop);
    let current = load
        .current_location
        .map(|location| location.point())
        .unwrap_or(pickup);
    let remaining = haversine_km(&current, &drop);

    let percent = if total > 0.0 {
        ((total - remaining) / total * 100.0).clamp(0.0, IN_TRANSIT_CEILING)
    } else {
        0.0
    };

    Progress {
        percent,
        remaining_km: Some(remaining),
    }
}
