use uuid::Uuid;

use crate::modules::payments::core::payment::PaymentMethod;

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub order_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub method: PaymentMethod,
}
