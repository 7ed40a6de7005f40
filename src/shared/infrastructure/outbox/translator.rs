// Turns domain events into outbox rows at commit time.
//
// Responsibilities
// - Map each domain event to an integration event via the bounded context's translator.
// - Serialize the envelope and build a fresh OutboxMessage for it.
//
// Boundaries
// - No network and no storage here. The rows are handed to the UnitOfWork that commits them
//   together with the state change that raised the events.

use std::sync::Arc;

use crate::shared::core::clock::Clock;
use crate::shared::infrastructure::integration_event::{
    IntegrationEvent, IntegrationEventTranslator, TranslationError,
};
use crate::shared::infrastructure::outbox::OutboxMessage;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

pub struct OutboxTranslator<T> {
    translator: T,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl<T> OutboxTranslator<T> {
    pub fn new(translator: T, clock: Arc<dyn Clock>, max_attempts: u32) -> Self {
        Self {
            translator,
            clock,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn to_outbox_messages<'a, E: 'a>(
        &self,
        events: impl IntoIterator<Item = &'a E>,
    ) -> Result<Vec<OutboxMessage>, TranslationError>
    where
        T: IntegrationEventTranslator<E>,
    {
        events
            .into_iter()
            .map(|event| {
                let envelope = self.translator.translate(event)?;
                to_outbox_message(&envelope, self.clock.as_ref(), self.max_attempts)
            })
            .collect()
    }
}

pub fn to_outbox_message(
    envelope: &IntegrationEvent,
    clock: &dyn Clock,
    max_attempts: u32,
) -> Result<OutboxMessage, TranslationError> {
    let content =
        serde_json::to_string(envelope).map_err(|source| TranslationError::Serialization {
            event_type: envelope.event_type.clone(),
            source,
        })?;
    let message = OutboxMessage::new(
        envelope.event_type.clone(),
        content,
        clock.now(),
        max_attempts,
    );
    tracing::debug!(
        message_id = %message.id,
        event_type = %message.event_type,
        aggregate_id = %envelope.aggregate_id,
        "outbox message created"
    );
    Ok(message)
}
