use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FailPayment {
    pub payment_id: Uuid,
    pub reason: String,
}
