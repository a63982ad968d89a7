use std::env;
use std::time::Duration;

use crate::error::AppError;

/// Upper bound for `OTP_TTL_SECS`, one day.
const MAX_OTP_TTL_SECS: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub jwt_secret: String,
    pub otp_ttl_secs: i64,
    pub otp_max_attempts: u32,
    pub poll_interval_ms: u64,
    pub simulation_interval_ms: u64,
}

/// Timer periods used by a trip session.
#[derive(Debug, Clone, Copy)]
pub struct TrackingConfig {
    pub poll_interval: Duration,
    pub simulation_interval: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Config::default().tracking()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            event_buffer_size: 1024,
            jwt_secret: "freight-trip-dev-secret".to_string(),
            otp_ttl_secs: 600,
            otp_max_attempts: 5,
            poll_interval_ms: 3_000,
            simulation_interval_ms: 2_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Config::default();

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") | Err(_) => LogFormat::Compact,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: {other}, expected compact/json"
                )));
            }
        };

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            otp_ttl_secs: parse_or_default("OTP_TTL_SECS", defaults.otp_ttl_secs)?,
            otp_max_attempts: parse_or_default("OTP_MAX_ATTEMPTS", defaults.otp_max_attempts)?,
            poll_interval_ms: parse_or_default("POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            simulation_interval_ms: parse_or_default(
                "SIMULATION_INTERVAL_MS",
                defaults.simulation_interval_ms,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=MAX_OTP_TTL_SECS).contains(&self.otp_ttl_secs) {
            return Err(AppError::Internal(format!(
                "invalid OTP_TTL_SECS: {}, expected 1..={MAX_OTP_TTL_SECS}",
                self.otp_ttl_secs
            )));
        }
        if self.otp_max_attempts == 0 {
            return Err(AppError::Internal(
                "invalid OTP_MAX_ATTEMPTS: must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tracking(&self) -> TrackingConfig {
        TrackingConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            simulation_interval: Duration::from_millis(self.simulation_interval_ms.max(1)),
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
