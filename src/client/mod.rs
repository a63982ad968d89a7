//! The Trip/Load API as seen by a trip session.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::Identity;
use crate::engine::{loads, trips};
use crate::engine::trips::OtpReceipt;
use crate::error::AppError;
use crate::models::coordinates::Coordinates;
use crate::models::load::{Load, LoadStatus};
use crate::state::AppState;

#[async_trait]
pub trait TripApi: Send + Sync {
    /// Bearer identity every call is made with.
    fn identity(&self) -> &Identity;

    async fn list_loads(&self) -> Result<Vec<Load>, AppError>;

    async fn location_history(&self, load_id: Uuid) -> Result<Vec<Coordinates>, AppError>;

    async fn update_status(&self, load_id: Uuid, status: LoadStatus) -> Result<Load, AppError>;

    async fn update_location(
        &self,
        load_id: Uuid,
        coordinates: Coordinates,
    ) -> Result<Coordinates, AppError>;

    async fn request_otp(&self, load_id: Uuid) -> Result<OtpReceipt, AppError>;

    async fn verify_otp(&self, load_id: Uuid, code: &str) -> Result<Load, AppError>;
}

/// Calls straight into the engine, in process, as a given identity.
#[derive(Clone)]
pub struct LocalTripApi {
    state: Arc<AppState>,
    identity: Identity,
}

impl LocalTripApi {
    pub fn new(state: Arc<AppState>, identity: Identity) -> Self {
        Self { state, identity }
    }
}

#[async_trait]
impl TripApi for LocalTripApi {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn list_loads(&self) -> Result<Vec<Load>, AppError> {
        Ok(loads::list_loads(&self.state, &self.identity))
    }

    async fn location_history(&self, load_id: Uuid) -> Result<Vec<Coordinates>, AppError> {
        trips::location_history(&self.state, &self.identity, load_id)
    }

    async fn update_status(&self, load_id: Uuid, status: LoadStatus) -> Result<Load, AppError> {
        trips::update_status(&self.state, &self.identity, load_id, status)
    }

    async fn update_location(
        &self,
        load_id: Uuid,
        coordinates: Coordinates,
    ) -> Result<Coordinates, AppError> {
        trips::update_location(&self.state, &self.identity, load_id, coordinates)
    }

    async fn request_otp(&self, load_id: Uuid) -> Result<OtpReceipt, AppError> {
        trips::request_otp(&self.state, &self.identity, load_id).await
    }

    async fn verify_otp(&self, load_id: Uuid, code: &str) -> Result<Load, AppError> {
        trips::verify_otp(&self.state, &self.identity, load_id, code)
    }
}
