//! Bearer identity carried by every API call.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::load::{Load, LoadStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Admin,
    Shipper,
    Transporter,
    Driver,
    Receiver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub email: Option<String>,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: Uuid, tenant_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            tenant_id,
            role,
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::SuperAdmin)
    }

    pub fn can_view(&self, load: &Load) -> bool {
        match self.role {
            Role::SuperAdmin => true,
            Role::Admin | Role::Shipper => load.tenant_id == self.tenant_id,
            Role::Driver => load.assigned_driver_id == Some(self.user_id),
            Role::Transporter => {
                load.assigned_transporter_id == Some(self.tenant_id)
                    || load.status == LoadStatus::Active
            }
            Role::Receiver => match (&self.email, &load.receiver_email) {
                (Some(mine), Some(theirs)) => mine.eq_ignore_ascii_case(theirs),
                _ => false,
            },
        }
    }

    /// Only the assigned driver advances a trip.
    pub fn drives(&self, load: &Load) -> bool {
        load.assigned_driver_id == Some(self.user_id)
    }

    pub fn owns_shipment(&self, load: &Load) -> bool {
        match self.role {
            Role::SuperAdmin => true,
            Role::Admin | Role::Shipper => load.tenant_id == self.tenant_id,
            _ => false,
        }
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            role: claims.role,
            email: claims.email,
        }
    }
}

pub fn issue_token(identity: &Identity, secret: &str, ttl: Duration) -> Result<String, AppError> {
    let claims = Claims {
        sub: identity.user_id,
        tenant_id: identity.tenant_id,
        role: identity.role,
        email: identity.email.clone(),
        exp: (Utc::now() + ttl).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| AppError::Internal(format!("failed to sign token: {err}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Identity, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|err| AppError::Unauthorized(format!("invalid token: {err}")))?;

    Ok(data.claims.into())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("expected a bearer token".to_string()))?;

        verify_token(token.trim(), &state.jwt_secret)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::{issue_token, verify_token, Identity, Role};

    #[test]
    fn token_round_trip_keeps_tenant_and_role() {
        let identity = Identity::new(Uuid::new_v4(), Uuid::new_v4(), Role::Driver)
            .with_email("driver@example.com");
        let token = issue_token(&identity, "secret", Duration::hours(1)).unwrap();
        assert_eq!(verify_token(&token, "secret").unwrap(), identity);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let identity = Identity::new(Uuid::new_v4(), Uuid::new_v4(), Role::Shipper);
        let token = issue_token(&identity, "secret", Duration::hours(1)).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }
}
