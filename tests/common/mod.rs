#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use freight_trip::auth::{Identity, Role};
use freight_trip::config::Config;
use freight_trip::engine::loads::{self, NewBid, NewLoad};
use freight_trip::error::AppError;
use freight_trip::models::coordinates::GeoPoint;
use freight_trip::notify::Notifier;
use freight_trip::state::AppState;

pub const MUMBAI: GeoPoint = GeoPoint {
    lat: 19.0760,
    lng: 72.8777,
};

pub const DELHI: GeoPoint = GeoPoint {
    lat: 28.7041,
    lng: 77.1025,
};

pub const RECEIVER_EMAIL: &str = "receiver@example.com";

#[derive(Debug, Clone, PartialEq)]
pub struct SentCode {
    pub receiver_email: String,
    pub load_id: Uuid,
    pub code: String,
}

/// Keeps every dispatched code so tests can play the receiver.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentCode>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentCode> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_code(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|sent| sent.code.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_delivery_code(
        &self,
        receiver_email: &str,
        load_id: Uuid,
        code: &str,
    ) -> Result<(), AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Notification("mail server unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(SentCode {
            receiver_email: receiver_email.to_string(),
            load_id,
            code: code.to_string(),
        });
        Ok(())
    }
}

pub struct Fixture {
    pub state: Arc<AppState>,
    pub notifier: Arc<RecordingNotifier>,
    pub shipper: Identity,
    pub transporter: Identity,
    pub driver: Identity,
    pub receiver: Identity,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let state = Arc::new(AppState::new(&config, notifier.clone()));

        let shipper_tenant = Uuid::new_v4();
        let transporter_tenant = Uuid::new_v4();

        Self {
            state,
            notifier,
            shipper: Identity::new(Uuid::new_v4(), shipper_tenant, Role::Shipper),
            transporter: Identity::new(Uuid::new_v4(), transporter_tenant, Role::Transporter),
            driver: Identity::new(Uuid::new_v4(), transporter_tenant, Role::Driver),
            receiver: Identity::new(Uuid::new_v4(), Uuid::new_v4(), Role::Receiver)
                .with_email(RECEIVER_EMAIL),
        }
    }

    pub fn new_load(&self) -> NewLoad {
        NewLoad {
            title: "Steel coils".to_string(),
            pickup_city: "Mumbai".to_string(),
            drop_city: "Delhi".to_string(),
            pickup_coordinates: Some(MUMBAI),
            drop_coordinates: Some(DELHI),
            receiver_email: Some(RECEIVER_EMAIL.to_string()),
            price: 50_000.0,
            insurance_premium: 1_000.0,
        }
    }

    /// Posts a load and has the transporter win it for the fixture driver.
    pub fn assigned_load(&self) -> Uuid {
        let load = loads::create_load(&self.state, &self.shipper, self.new_load()).unwrap();
        loads::place_bid(
            &self.state,
            &self.transporter,
            load.id,
            NewBid {
                amount: 48_000.0,
                vehicle_details: "MH-12 AB 1234, 20ft container".to_string(),
                driver_id: Some(self.driver.user_id),
            },
        )
        .unwrap();
        load.id
    }
}
