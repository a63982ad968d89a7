use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::auth::Identity;
use crate::engine::loads::{self, NewBid, NewLoad};
use crate::error::AppError;
use crate::models::load::Load;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/loads", post(create_load).get(list_loads))
        .route("/loads/:id", get(get_load))
        .route("/loads/:id/bids", post(place_bid))
        .route("/loads/:id/pay-advance", post(pay_advance))
        .route("/loads/:id/pay-balance", post(pay_balance))
}

async fn create_load(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(payload): Json<NewLoad>,
) -> Result<(StatusCode, Json<Load>), AppError> {
    let load = loads::create_load(&state, &identity, payload)?;
    Ok((StatusCode::CREATED, Json(load)))
}

async fn list_loads(State(state): State<Arc<AppState>>, identity: Identity) -> Json<Vec<Load>> {
    Json(loads::list_loads(&state, &identity))
}

async fn get_load(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Load>, AppError> {
    Ok(Json(loads::get_load(&state, &identity, id)?))
}

async fn place_bid(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewBid>,
) -> Result<Json<Load>, AppError> {
    Ok(Json(loads::place_bid(&state, &identity, id, payload)?))
}

async fn pay_advance(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Load>, AppError> {
    Ok(Json(loads::pay_advance(&state, &identity, id)?))
}

async fn pay_balance(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Load>, AppError> {
    Ok(Json(loads::pay_balance(&state, &identity, id)?))
}
