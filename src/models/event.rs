use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::coordinates::Coordinates;
use crate::models::load::{Load, LoadStatus};

/// Where a transport event came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    /// Echo of a fix produced in this process.
    Local,
    /// Change detected by the polling diff.
    Poll,
    /// Pushed by the server after a write.
    Server,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationEvent {
    pub load_id: Uuid,
    pub coordinates: Option<Coordinates>,
    pub status: LoadStatus,
    pub origin: EventOrigin,
}

impl LocationEvent {
    pub fn from_load(load: &Load, origin: EventOrigin) -> Self {
        Self {
            load_id: load.id,
            coordinates: load.current_location,
            status: load.status,
            origin,
        }
    }
}
