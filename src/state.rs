use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::otp::{DeliveryChallenge, OtpPolicy};
use crate::models::coordinates::Coordinates;
use crate::models::event::LocationEvent;
use crate::models::load::Load;
use crate::notify::Notifier;
use crate::observability::metrics::Metrics;

const FIRST_LOAD_NUMBER: u64 = 1001;

pub struct AppState {
    pub loads: DashMap<Uuid, Load>,
    /// Append-only path history per load.
    pub location_history: DashMap<Uuid, Vec<Coordinates>>,
    /// Delivery codes never leave the server.
    pub delivery_challenges: DashMap<Uuid, DeliveryChallenge>,
    pub location_events_tx: broadcast::Sender<LocationEvent>,
    pub notifier: Arc<dyn Notifier>,
    pub otp_policy: OtpPolicy,
    pub jwt_secret: String,
    pub metrics: Metrics,
    next_load_number: AtomicU64,
}

impl AppState {
    pub fn new(config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        let (location_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size.max(1));

        Self {
            loads: DashMap::new(),
            location_history: DashMap::new(),
            delivery_challenges: DashMap::new(),
            location_events_tx,
            notifier,
            otp_policy: OtpPolicy {
                ttl: Duration::seconds(config.otp_ttl_secs),
                max_attempts: config.otp_max_attempts.max(1),
            },
            jwt_secret: config.jwt_secret.clone(),
            metrics: Metrics::new(),
            next_load_number: AtomicU64::new(FIRST_LOAD_NUMBER),
        }
    }

    pub fn next_load_number(&self) -> String {
        format!("L-{}", self.next_load_number.fetch_add(1, Ordering::Relaxed))
    }

    pub fn publish(&self, event: LocationEvent) {
        let _ = self.location_events_tx.send(event);
    }
}
