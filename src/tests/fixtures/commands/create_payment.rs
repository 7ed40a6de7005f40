// Shared test fixture for the CreatePayment command.

use uuid::Uuid;

use crate::modules::payments::core::payment::PaymentMethod;
use crate::modules::payments::use_cases::create_payment::command::CreatePayment;

pub struct CreatePaymentBuilder {
    inner: CreatePayment,
}

impl Default for CreatePaymentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
impl CreatePaymentBuilder {
    pub fn new() -> Self {
        Self {
            inner: CreatePayment {
                order_id: Uuid::now_v7(),
                amount_minor: 1_999,
                currency: "EUR".to_string(),
                method: PaymentMethod::Card,
            },
        }
    }

    pub fn order_id(mut self, v: Uuid) -> Self {
        self.inner.order_id = v;
        self
    }

    pub fn amount_minor(mut self, v: i64) -> Self {
        self.inner.amount_minor = v;
        self
    }

    pub fn currency(mut self, v: impl Into<String>) -> Self {
        self.inner.currency = v.into();
        self
    }

    pub fn method(mut self, v: PaymentMethod) -> Self {
        self.inner.method = v;
        self
    }

    pub fn build(self) -> CreatePayment {
        self.inner
    }
}

#[cfg(test)]
mod create_payment_builder_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn setters_override_the_defaults() {
        let order_id = Uuid::now_v7();
        let command = CreatePaymentBuilder::new()
            .order_id(order_id)
            .amount_minor(5)
            .currency("usd")
            .method(PaymentMethod::Wallet)
            .build();

        assert_eq!(command.order_id, order_id);
        assert_eq!(command.amount_minor, 5);
        assert_eq!(command.currency, "usd");
        assert_eq!(command.method, PaymentMethod::Wallet);
    }
}
