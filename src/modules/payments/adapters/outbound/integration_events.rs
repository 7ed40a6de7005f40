use serde_json::json;
use std::sync::Arc;

use crate::modules::payments::core::events::PaymentEvent;
use crate::modules::payments::core::payment::Payment;
use crate::shared::core::aggregate::DomainEvent;
use crate::shared::core::clock::Clock;
use crate::shared::infrastructure::integration_event::{
    IntegrationEvent, IntegrationEventTranslator, TranslationError,
};
use crate::shared::infrastructure::outbox::translator::OutboxTranslator;
use crate::shared::infrastructure::persistence::UnitOfWork;
use crate::shared::infrastructure::persistence::repository::AggregateRepository;

pub type PaymentRepository<U> = AggregateRepository<Payment, PaymentIntegrationEvents, U>;

/// Builds the payment repository with its outbox translator.
pub fn payment_repository<U>(
    unit_of_work: Arc<U>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
) -> PaymentRepository<U>
where
    U: UnitOfWork,
{
    AggregateRepository::new(
        unit_of_work,
        OutboxTranslator::new(PaymentIntegrationEvents, clock, max_attempts),
    )
}

/// Public contract of the payments context. Payloads are camelCase and versioned
/// independently of the internal event enum.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentIntegrationEvents;

impl IntegrationEventTranslator<PaymentEvent> for PaymentIntegrationEvents {
    fn translate(&self, event: &PaymentEvent) -> Result<IntegrationEvent, TranslationError> {
        let payload = match event {
            PaymentEvent::PaymentCreatedV1(e) => json!({
                "paymentId": e.payment_id,
                "orderId": e.order_id,
                "amountMinor": e.amount_minor,
                "currency": e.currency,
                "method": e.method,
            }),
            PaymentEvent::PaymentCompletedV1(e) => json!({
                "paymentId": e.payment_id,
                "orderId": e.order_id,
                "amountMinor": e.amount_minor,
                "currency": e.currency,
                "transactionId": e.transaction_id,
            }),
            PaymentEvent::PaymentFailedV1(e) => json!({
                "paymentId": e.payment_id,
                "orderId": e.order_id,
                "reason": e.reason,
            }),
        };
        Ok(IntegrationEvent::new(
            event.event_type(),
            1,
            event.aggregate_id(),
            event.occurred_on_utc(),
            payload,
        ))
    }
}

#[cfg(test)]
mod payment_integration_events_tests {
    use super::*;
    use crate::modules::payments::core::payment::PaymentMethod;
    use crate::shared::core::aggregate::Aggregate;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use uuid::Uuid;

    #[rstest]
    fn it_should_translate_every_lifecycle_event() {
        let now = Utc.with_ymd_and_hms(2024, 5, 5, 9, 30, 0).unwrap();
        let order_id = Uuid::now_v7();
        let mut payment =
            Payment::create(order_id, 4_200, "EUR", PaymentMethod::BankTransfer, now).unwrap();
        payment.complete("tx-42", now).unwrap();
        let events = payment.pending_events_mut().drain();

        let translated: Vec<IntegrationEvent> = events
            .iter()
            .map(|e| PaymentIntegrationEvents.translate(e).unwrap())
            .collect();

        assert_eq!(translated[0].event_type, "PaymentCreated");
        assert_eq!(translated[0].payload["method"], "BankTransfer");
        assert_eq!(translated[0].payload["amountMinor"], 4_200);
        assert_eq!(translated[1].event_type, "PaymentCompleted");
        assert_eq!(translated[1].payload["transactionId"], "tx-42");
        for envelope in &translated {
            assert_eq!(envelope.event_version, 1);
            assert_eq!(envelope.aggregate_id, payment.id());
            assert_eq!(envelope.occurred_on_utc, now);
            assert_eq!(envelope.payload["orderId"], json!(order_id));
        }
    }

    #[rstest]
    fn it_should_carry_the_failure_reason() {
        let now = Utc::now();
        let mut payment =
            Payment::create(Uuid::now_v7(), 1, "USD", PaymentMethod::Card, now).unwrap();
        payment.mark_failed("insufficient funds", now).unwrap();
        let events = payment.pending_events_mut().drain();

        let envelope = PaymentIntegrationEvents.translate(&events[1]).unwrap();

        assert_eq!(envelope.event_type, "PaymentFailed");
        assert_eq!(envelope.payload["reason"], "insufficient funds");
    }
}
