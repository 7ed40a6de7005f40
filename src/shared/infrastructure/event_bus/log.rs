// Publisher that writes every integration event to the log. Used by the binary until a
// broker is wired in.

use async_trait::async_trait;

use crate::shared::infrastructure::event_bus::{EventPublisher, PublishError};
use crate::shared::infrastructure::integration_event::IntegrationEvent;

#[derive(Debug, Clone)]
pub struct LogPublisher {
    topic: String,
}

impl LogPublisher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(
        &self,
        event_type: &str,
        event: &IntegrationEvent,
    ) -> Result<(), PublishError> {
        tracing::info!(
            topic = %self.topic,
            event_type,
            event_id = %event.id,
            aggregate_id = %event.aggregate_id,
            payload = %event.payload,
            "integration event published"
        );
        Ok(())
    }
}
