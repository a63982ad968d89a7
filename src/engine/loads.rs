use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{Identity, Role};
use crate::engine::billing::{advance_amount, balance_amount, compute_financials};
use crate::error::AppError;
use crate::models::coordinates::GeoPoint;
use crate::models::load::{Bid, BidStatus, Load, LoadStatus, PaymentStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewLoad {
    pub title: String,
    pub pickup_city: String,
    pub drop_city: String,
    pub pickup_coordinates: Option<GeoPoint>,
    pub drop_coordinates: Option<GeoPoint>,
    pub receiver_email: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub insurance_premium: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBid {
    pub amount: f64,
    pub vehicle_details: String,
    pub driver_id: Option<Uuid>,
}

pub fn create_load(state: &AppState, identity: &Identity, new: NewLoad) -> Result<Load, AppError> {
    if !matches!(identity.role, Role::Shipper | Role::Admin | Role::SuperAdmin) {
        return Err(AppError::Forbidden("only shippers can post loads".to_string()));
    }
    if new.title.trim().is_empty() {
        return Err(AppError::BadRequest("title cannot be empty".to_string()));
    }
    if new.price < 0.0 || new.insurance_premium < 0.0 {
        return Err(AppError::BadRequest("amounts must be >= 0".to_string()));
    }
    for point in [new.pickup_coordinates, new.drop_coordinates].into_iter().flatten() {
        validate_point(&point)?;
    }

    let load = Load {
        id: Uuid::new_v4(),
        tenant_id: identity.tenant_id,
        load_number: state.next_load_number(),
        title: new.title,
        shipper_user_id: identity.user_id,
        pickup_city: new.pickup_city,
        drop_city: new.drop_city,
        pickup_coordinates: new.pickup_coordinates,
        drop_coordinates: new.drop_coordinates,
        status: LoadStatus::Active,
        assigned_transporter_id: None,
        assigned_driver_id: None,
        receiver_email: new.receiver_email.filter(|email| !email.trim().is_empty()),
        price: new.price,
        insurance_premium: new.insurance_premium,
        bids: Vec::new(),
        current_location: None,
        arrival_recorded: false,
        last_updated: None,
        revision: 0,
        created_at: Utc::now(),
        platform_fee: None,
        tax_total: None,
        total_amount: None,
        payment_status: PaymentStatus::Pending,
        advance_amount: None,
        balance_amount: None,
        invoice_number: None,
        invoice_date: None,
    };

    state.loads.insert(load.id, load.clone());
    info!(load_id = %load.id, load_number = %load.load_number, "load created");
    Ok(load)
}

pub fn list_loads(state: &AppState, identity: &Identity) -> Vec<Load> {
    let mut loads: Vec<Load> = state
        .loads
        .iter()
        .filter(|entry| identity.can_view(entry.value()))
        .map(|entry| entry.value().clone())
        .collect();

    loads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    loads
}

pub fn get_load(state: &AppState, identity: &Identity, id: Uuid) -> Result<Load, AppError> {
    state
        .loads
        .get(&id)
        .filter(|entry| identity.can_view(entry.value()))
        .map(|entry| entry.value().clone())
        .ok_or_else(|| not_found(id))
}

pub fn place_bid(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
    bid: NewBid,
) -> Result<Load, AppError> {
    if identity.role != Role::Transporter {
        return Err(AppError::Forbidden("only transporters can bid".to_string()));
    }
    if bid.amount <= 0.0 {
        return Err(AppError::BadRequest("bid amount must be > 0".to_string()));
    }

    let mut load = state.loads.get_mut(&id).ok_or_else(|| not_found(id))?;
    if load.status != LoadStatus::Active {
        return Err(AppError::Conflict(format!(
            "load {} is {} and not open for bids",
            id, load.status
        )));
    }

    let driver_id = bid.driver_id.unwrap_or(identity.user_id);
    load.bids.push(Bid {
        id: Uuid::new_v4(),
        tenant_id: identity.tenant_id,
        amount: bid.amount,
        vehicle_details: bid.vehicle_details,
        status: BidStatus::Accepted,
        placed_at: Utc::now(),
    });
    load.status = LoadStatus::Assigned;
    load.assigned_transporter_id = Some(identity.tenant_id);
    load.assigned_driver_id = Some(driver_id);
    load.price = bid.amount;
    load.touch();

    info!(load_id = %id, driver_id = %driver_id, amount = bid.amount, "load assigned");
    Ok(load.clone())
}

pub fn pay_advance(state: &AppState, identity: &Identity, id: Uuid) -> Result<Load, AppError> {
    let mut load = state.loads.get_mut(&id).ok_or_else(|| not_found(id))?;
    if !identity.owns_shipment(&load) {
        return Err(AppError::Forbidden("only the shipper can pay".to_string()));
    }
    if load.payment_status != PaymentStatus::Pending {
        return Err(AppError::Conflict("advance already paid".to_string()));
    }

    let financials = compute_financials(load.price, load.insurance_premium);
    load.platform_fee = Some(financials.platform_fee);
    load.tax_total = Some(financials.tax_total);
    load.total_amount = Some(financials.total_amount);
    load.advance_amount = Some(advance_amount(financials.total_amount));
    load.payment_status = PaymentStatus::AdvancePaid;

    info!(load_id = %id, total = financials.total_amount, "advance paid");
    Ok(load.clone())
}

pub fn pay_balance(state: &AppState, identity: &Identity, id: Uuid) -> Result<Load, AppError> {
    let mut load = state.loads.get_mut(&id).ok_or_else(|| not_found(id))?;
    if !identity.owns_shipment(&load) {
        return Err(AppError::Forbidden("only the shipper can pay".to_string()));
    }
    if load.payment_status == PaymentStatus::FullyPaid {
        return Err(AppError::Conflict("load is already fully paid".to_string()));
    }

    let total = match load.total_amount {
        Some(total) => total,
        None => compute_financials(load.price, load.insurance_premium).total_amount,
    };
    let advance = load.advance_amount.unwrap_or(0.0);
    load.total_amount = Some(total);
    load.balance_amount = Some(balance_amount(total, advance));
    load.payment_status = PaymentStatus::FullyPaid;

    info!(load_id = %id, balance = total - advance, "balance paid");
    Ok(load.clone())
}

pub(crate) fn validate_point(point: &GeoPoint) -> Result<(), AppError> {
    let valid = point.lat.is_finite()
        && point.lng.is_finite()
        && (-90.0..=90.0).contains(&point.lat)
        && (-180.0..=180.0).contains(&point.lng);
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "invalid coordinates ({}, {})",
            point.lat, point.lng
        )))
    }
}

pub(crate) fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("load {} not found", id))
}
