// Transport agnostic envelope published to other services.
//
// Purpose
// - Carry the type name, version and business payload of a domain event across service
//   boundaries without leaking the internal event enum.
//
// Versioning
// - Prefer additive payload changes. A breaking change gets a new event_version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationEvent {
    pub id: Uuid,
    pub event_type: String,
    pub event_version: i32,
    pub aggregate_id: Uuid,
    pub occurred_on_utc: DateTime<Utc>,
    pub payload: Json,
}

impl IntegrationEvent {
    pub fn new(
        event_type: impl Into<String>,
        event_version: i32,
        aggregate_id: Uuid,
        occurred_on_utc: DateTime<Utc>,
        payload: Json,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            event_version,
            aggregate_id,
            occurred_on_utc,
            payload,
        }
    }
}

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("failed to serialize {event_type}: {source}")]
    Serialization {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Maps a bounded context's domain events to integration events.
pub trait IntegrationEventTranslator<E>: Send + Sync {
    fn translate(&self, event: &E) -> Result<IntegrationEvent, TranslationError>;
}

#[cfg(test)]
mod integration_event_tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn it_should_serialize_with_camel_case_fields() {
        let event = IntegrationEvent::new(
            "PaymentCompleted",
            1,
            Uuid::now_v7(),
            Utc::now(),
            json!({ "transactionId": "tx-1" }),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["eventType"], "PaymentCompleted");
        assert_eq!(value["eventVersion"], 1);
        assert!(value.get("occurredOnUtc").is_some());
        assert!(value.get("aggregateId").is_some());
    }
}
