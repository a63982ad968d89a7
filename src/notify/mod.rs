//! Delivery-code dispatch to the receiver.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_delivery_code(
        &self,
        receiver_email: &str,
        load_id: Uuid,
        code: &str,
    ) -> Result<(), AppError>;
}

/// Writes the code to the log instead of sending mail.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_delivery_code(
        &self,
        receiver_email: &str,
        load_id: Uuid,
        code: &str,
    ) -> Result<(), AppError> {
        info!(
            load_id = %load_id,
            receiver = receiver_email,
            code,
            "delivery code dispatched"
        );
        Ok(())
    }
}
