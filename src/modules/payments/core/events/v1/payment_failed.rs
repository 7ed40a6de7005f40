use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentFailedV1 {
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub reason: String,
    pub occurred_on_utc: DateTime<Utc>,
}
