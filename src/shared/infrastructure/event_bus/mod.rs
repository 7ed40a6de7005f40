use async_trait::async_trait;
use thiserror::Error;

use crate::shared::infrastructure::integration_event::IntegrationEvent;

pub mod in_memory;
pub mod log;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("transport rejected {event_type}: {reason}")]
    Rejected { event_type: String, reason: String },

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Outbound transport. Delivery is at-least-once, so consumers must be idempotent on the
/// envelope id.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event_type: &str, event: &IntegrationEvent)
    -> Result<(), PublishError>;
}
