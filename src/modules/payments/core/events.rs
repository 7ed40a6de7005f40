// Root event enumeration for the payment aggregate and re-exports of versioned payloads.
//
// Versioning and evolution
// - Prefer additive changes. If a breaking change is needed, add a new version and a new variant.
// - Do not change the meaning of historical events.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::shared::core::aggregate::DomainEvent;

pub mod v1 {
    pub mod payment_completed;
    pub mod payment_created;
    pub mod payment_failed;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum PaymentEvent {
    PaymentCreatedV1(v1::payment_created::PaymentCreatedV1),
    PaymentCompletedV1(v1::payment_completed::PaymentCompletedV1),
    PaymentFailedV1(v1::payment_failed::PaymentFailedV1),
}

impl DomainEvent for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentCreatedV1(_) => "PaymentCreated",
            PaymentEvent::PaymentCompletedV1(_) => "PaymentCompleted",
            PaymentEvent::PaymentFailedV1(_) => "PaymentFailed",
        }
    }

    fn occurred_on_utc(&self) -> DateTime<Utc> {
        match self {
            PaymentEvent::PaymentCreatedV1(e) => e.occurred_on_utc,
            PaymentEvent::PaymentCompletedV1(e) => e.occurred_on_utc,
            PaymentEvent::PaymentFailedV1(e) => e.occurred_on_utc,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            PaymentEvent::PaymentCreatedV1(e) => e.payment_id,
            PaymentEvent::PaymentCompletedV1(e) => e.payment_id,
            PaymentEvent::PaymentFailedV1(e) => e.payment_id,
        }
    }
}
