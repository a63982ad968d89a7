use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::coordinates::{Coordinates, GeoPoint};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LoadStatus {
    Draft,
    Active,
    Pending,
    Assigned,
    #[serde(rename = "In Transit")]
    InTransit,
    Paused,
    Reached,
    Completed,
    Cancelled,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Draft => "Draft",
            LoadStatus::Active => "Active",
            LoadStatus::Pending => "Pending",
            LoadStatus::Assigned => "Assigned",
            LoadStatus::InTransit => "In Transit",
            LoadStatus::Paused => "Paused",
            LoadStatus::Reached => "Reached",
            LoadStatus::Completed => "Completed",
            LoadStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadStatus::Completed | LoadStatus::Cancelled)
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    AdvancePaid,
    FullyPaid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub amount: f64,
    pub vehicle_details: String,
    pub status: BidStatus,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Load {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub load_number: String,
    pub title: String,
    pub shipper_user_id: Uuid,
    pub pickup_city: String,
    pub drop_city: String,
    pub pickup_coordinates: Option<GeoPoint>,
    pub drop_coordinates: Option<GeoPoint>,
    pub status: LoadStatus,
    pub assigned_transporter_id: Option<Uuid>,
    pub assigned_driver_id: Option<Uuid>,
    pub receiver_email: Option<String>,
    pub price: f64,
    pub insurance_premium: f64,
    pub bids: Vec<Bid>,
    pub current_location: Option<Coordinates>,
    /// Set by the single location write accepted after arrival.
    #[serde(default)]
    pub arrival_recorded: bool,
    pub last_updated: Option<DateTime<Utc>>,
    /// Bumped on every status or location write.
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub platform_fee: Option<f64>,
    pub tax_total: Option<f64>,
    pub total_amount: Option<f64>,
    pub payment_status: PaymentStatus,
    pub advance_amount: Option<f64>,
    pub balance_amount: Option<f64>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<DateTime<Utc>>,
}

impl Load {
    /// Change-detection key for the location transport.
    pub fn signature(&self) -> String {
        let updated = self
            .last_updated
            .map(|ts| ts.timestamp_micros())
            .unwrap_or_default();
        format!("{}-{}-{}", self.id, updated, self.revision)
    }

    pub fn touch(&mut self) {
        self.last_updated = Some(Utc::now());
        self.revision = self.revision.saturating_add(1);
    }
}
