pub mod alerts;
pub mod billing;
pub mod lifecycle;
pub mod loads;
pub mod otp;
pub mod progress;
pub mod trips;
