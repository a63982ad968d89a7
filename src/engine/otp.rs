//! Server-held delivery code gating the `Reached -> Completed` transition.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::error::AppError;

#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    pub ttl: Duration,
    pub max_attempts: u32,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(10),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryChallenge {
    code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub failed_attempts: u32,
}

impl DeliveryChallenge {
    pub fn issue<R: Rng + ?Sized>(rng: &mut R, policy: &OtpPolicy, now: DateTime<Utc>) -> Self {
        let code = rng.random_range(100_000..1_000_000u32).to_string();
        Self::with_code(code, policy, now)
    }

    pub fn with_code(code: String, policy: &OtpPolicy, now: DateTime<Utc>) -> Self {
        Self {
            code,
            issued_at: now,
            expires_at: now + policy.ttl,
            failed_attempts: 0,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn verify(
        &mut self,
        submitted: &str,
        policy: &OtpPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.failed_attempts >= policy.max_attempts {
            return Err(AppError::OtpLocked);
        }
        if now >= self.expires_at {
            return Err(AppError::OtpExpired);
        }

        if codes_match(self.code.as_bytes(), submitted.trim().as_bytes()) {
            return Ok(());
        }

        self.failed_attempts += 1;
        if self.failed_attempts >= policy.max_attempts {
            return Err(AppError::OtpLocked);
        }
        Err(AppError::InvalidOtp {
            attempts_left: policy.max_attempts - self.failed_attempts,
        })
    }
}

fn codes_match(expected: &[u8], submitted: &[u8]) -> bool {
    if expected.len() != submitted.len() {
        return false;
    }
    expected
        .iter()
        .zip(submitted)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
