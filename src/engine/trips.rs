use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Identity;
use crate::engine::billing::compute_financials;
use crate::engine::lifecycle::TripAction;
use crate::engine::loads::{not_found, validate_point};
use crate::engine::otp::DeliveryChallenge;
use crate::error::AppError;
use crate::models::coordinates::Coordinates;
use crate::models::event::{EventOrigin, LocationEvent};
use crate::models::load::{Load, LoadStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtpReceipt {
    pub requested: bool,
    pub expires_at: DateTime<Utc>,
}

/// Applies a driver-initiated status change. Completion goes through [`verify_otp`].
pub fn update_status(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
    target: LoadStatus,
) -> Result<Load, AppError> {
    let mut load = state.loads.get_mut(&id).ok_or_else(|| not_found(id))?;
    if !identity.can_view(&load) {
        return Err(not_found(id));
    }
    if !identity.drives(&load) {
        return Err(AppError::Forbidden(
            "only the assigned driver can change trip status".to_string(),
        ));
    }

    let action = load.status.action_towards(target)?;
    if action == TripAction::ConfirmDelivery {
        return Err(AppError::Conflict(
            "delivery must be confirmed with the receiver's code".to_string(),
        ));
    }

    let from = load.status;
    load.status = load.status.apply(action)?;
    load.touch();
    let updated = load.clone();
    drop(load);

    state
        .metrics
        .trip_transitions_total
        .with_label_values(&[updated.status.as_str()])
        .inc();
    state.publish(LocationEvent::from_load(&updated, EventOrigin::Server));

    info!(load_id = %id, from = %from, to = %updated.status, "trip status changed");
    Ok(updated)
}

/// Records a fix as the load's current location and appends it to the history ledger.
pub fn update_location(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
    mut coordinates: Coordinates,
) -> Result<Coordinates, AppError> {
    validate_point(&coordinates.point())?;
    if coordinates.speed.is_some_and(|speed| speed < 0.0 || !speed.is_finite()) {
        return Err(AppError::BadRequest("speed must be >= 0".to_string()));
    }

    let mut load = state.loads.get_mut(&id).ok_or_else(|| not_found(id))?;
    if !identity.can_view(&load) {
        return Err(not_found(id));
    }
    if !identity.drives(&load) {
        return Err(AppError::Forbidden(
            "only the assigned driver can report location".to_string(),
        ));
    }
    if !matches!(load.status, LoadStatus::InTransit | LoadStatus::Reached) {
        return Err(AppError::Conflict(format!(
            "load {} is {} and not being tracked",
            id, load.status
        )));
    }
    if load.status == LoadStatus::Reached {
        if load.arrival_recorded {
            return Err(AppError::Conflict(format!(
                "load {} has reached and its final location is already recorded",
                id
            )));
        }
        load.arrival_recorded = true;
    }

    let mut history = state.location_history.entry(id).or_default();
    if let Some(last) = history.last() {
        if coordinates.captured_at < last.captured_at {
            coordinates.captured_at = last.captured_at;
        }
    }
    history.push(coordinates);
    drop(history);

    load.current_location = Some(coordinates);
    load.touch();
    let event = LocationEvent::from_load(&load, EventOrigin::Server);
    drop(load);

    state.metrics.location_updates_total.inc();
    state.publish(event);
    Ok(coordinates)
}

pub fn location_history(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
) -> Result<Vec<Coordinates>, AppError> {
    let visible = state
        .loads
        .get(&id)
        .is_some_and(|load| identity.can_view(load.value()));
    if !visible {
        return Err(not_found(id));
    }

    Ok(state
        .location_history
        .get(&id)
        .map(|history| history.value().clone())
        .unwrap_or_default())
}

/// Issues a fresh delivery code and sends it to the receiver. Once sent, any earlier code stops working.
pub async fn request_otp(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
) -> Result<OtpReceipt, AppError> {
    let load = state
        .loads
        .get(&id)
        .filter(|load| identity.can_view(load.value()))
        .map(|load| load.value().clone())
        .ok_or_else(|| not_found(id))?;

    if load.status != LoadStatus::Reached {
        return Err(AppError::Conflict(format!(
            "delivery code can only be requested once the load has reached, load is {}",
            load.status
        )));
    }
    let receiver_email = load
        .receiver_email
        .clone()
        .ok_or_else(|| AppError::BadRequest("load has no receiver email".to_string()))?;

    let challenge = {
        let mut rng = rand::rng();
        DeliveryChallenge::issue(&mut rng, &state.otp_policy, Utc::now())
    };
    let receipt = OtpReceipt {
        requested: true,
        expires_at: challenge.expires_at,
    };

    if let Err(err) = state
        .notifier
        .send_delivery_code(&receiver_email, id, challenge.code())
        .await
    {
        state
            .metrics
            .otp_requests_total
            .with_label_values(&["failed"])
            .inc();
        warn!(load_id = %id, error = %err, "delivery code dispatch failed");
        return Err(match err {
            AppError::Notification(_) => err,
            other => AppError::Notification(other.to_string()),
        });
    }

    // The previous code stays valid until the new one has been delivered.
    state.delivery_challenges.insert(id, challenge);

    state
        .metrics
        .otp_requests_total
        .with_label_values(&["sent"])
        .inc();
    info!(load_id = %id, expires_at = %receipt.expires_at, "delivery code requested");
    Ok(receipt)
}

/// Checks the receiver's code and, on a match, completes the load and finalizes totals.
pub fn verify_otp(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
    code: &str,
) -> Result<Load, AppError> {
    let status = state
        .loads
        .get(&id)
        .filter(|load| identity.can_view(load.value()))
        .map(|load| load.status)
        .ok_or_else(|| not_found(id))?;

    match status {
        LoadStatus::Reached => {}
        LoadStatus::Completed => {
            return Err(AppError::Conflict(format!("load {} is already completed", id)));
        }
        other => {
            return Err(AppError::InvalidTransition {
                from: other,
                to: LoadStatus::Completed,
            });
        }
    }

    let outcome = {
        let mut challenge = state.delivery_challenges.get_mut(&id).ok_or_else(|| {
            AppError::Conflict("no delivery code has been requested".to_string())
        })?;
        challenge.verify(code, &state.otp_policy, Utc::now())
    };

    let label = match &outcome {
        Ok(()) => "verified",
        Err(AppError::InvalidOtp { .. }) => "invalid",
        Err(AppError::OtpExpired) => "expired",
        Err(AppError::OtpLocked) => "locked",
        Err(_) => "error",
    };
    state
        .metrics
        .otp_verifications_total
        .with_label_values(&[label])
        .inc();

    if let Err(err) = outcome {
        warn!(load_id = %id, error = %err, "delivery code rejected");
        return Err(err);
    }

    let mut load = state.loads.get_mut(&id).ok_or_else(|| not_found(id))?;
    load.status = load.status.apply(TripAction::ConfirmDelivery)?;

    let financials = compute_financials(load.price, load.insurance_premium);
    let now = Utc::now();
    load.platform_fee = Some(financials.platform_fee);
    load.tax_total = Some(financials.tax_total);
    load.total_amount = Some(financials.total_amount);
    if load.invoice_number.is_none() {
        let suffix = rand::rng().random_range(1000..10000);
        load.invoice_number = Some(format!("INV-{}-{}", now.year(), suffix));
    }
    load.invoice_date = Some(now);
    load.touch();
    let completed = load.clone();
    drop(load);

    state.delivery_challenges.remove(&id);
    state
        .metrics
        .trip_transitions_total
        .with_label_values(&[completed.status.as_str()])
        .inc();
    state.publish(LocationEvent::from_load(&completed, EventOrigin::Server));

    info!(
        load_id = %id,
        total = financials.total_amount,
        invoice = ?completed.invoice_number,
        "delivery verified"
    );
    Ok(completed)
}
