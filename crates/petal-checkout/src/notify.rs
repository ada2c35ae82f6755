//! Order notification port.
//!
//! Called after the order transaction commits. A failure here is logged
//! by the caller and never undoes the order.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::order::OrderView;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn send_order_confirmation(&self, order: &OrderView) -> Result<(), NotifyError>;
}

/// Writes the confirmation to the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl OrderNotifier for LoggingNotifier {
    async fn send_order_confirmation(&self, view: &OrderView) -> Result<(), NotifyError> {
        info!(
            order_id = %view.order.id,
            email = %view.order.email,
            items = view.items.len(),
            total = %view.order.total(),
            "Order confirmation"
        );
        Ok(())
    }
}
