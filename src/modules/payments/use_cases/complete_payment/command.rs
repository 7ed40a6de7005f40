use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CompletePayment {
    pub payment_id: Uuid,
    pub transaction_id: String,
}
