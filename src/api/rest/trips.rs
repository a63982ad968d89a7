use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Identity;
use crate::engine::loads;
use crate::engine::progress::{compute_progress, Progress};
use crate::engine::trips::{self, OtpReceipt};
use crate::error::AppError;
use crate::models::coordinates::Coordinates;
use crate::models::load::{Load, LoadStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/loads/:id/status", patch(update_status))
        .route("/loads/:id/location", post(update_location))
        .route("/loads/:id/history", get(location_history))
        .route("/loads/:id/progress", get(progress))
        .route("/loads/:id/otp/request", post(request_otp))
        .route("/loads/:id/otp/verify", post(verify_otp))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: LoadStatus,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub code: String,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Load>, AppError> {
    Ok(Json(trips::update_status(&state, &identity, id, payload.status)?))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<Coordinates>,
) -> Result<Json<Coordinates>, AppError> {
    Ok(Json(trips::update_location(&state, &identity, id, payload)?))
}

async fn location_history(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Coordinates>>, AppError> {
    Ok(Json(trips::location_history(&state, &identity, id)?))
}

async fn progress(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Progress>, AppError> {
    let load = loads::get_load(&state, &identity, id)?;
    Ok(Json(compute_progress(&load)))
}

async fn request_otp(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<OtpReceipt>, AppError> {
    Ok(Json(trips::request_otp(&state, &identity, id).await?))
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<Load>, AppError> {
    Ok(Json(trips::verify_otp(&state, &identity, id, &payload.code)?))
}
