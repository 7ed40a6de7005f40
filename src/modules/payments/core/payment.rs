// Payment aggregate.
//
// Lifecycle
// - Pending -> Completed (terminal)
// - Pending -> Failed (terminal)
//
// Every accepted transition records a PaymentEvent in the pending buffer. Repeating the
// transition that produced the current terminal state is accepted and records nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::modules::payments::core::events::PaymentEvent;
use crate::modules::payments::core::events::v1::payment_completed::PaymentCompletedV1;
use crate::modules::payments::core::events::v1::payment_created::PaymentCreatedV1;
use crate::modules::payments::core::events::v1::payment_failed::PaymentFailedV1;
use crate::shared::core::aggregate::{Aggregate, AuditableIdentity, PendingEvents};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Wallet,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("amount must be positive")]
    InvalidAmount,

    #[error("currency must be a three letter code")]
    InvalidCurrency,

    #[error("transaction id must not be empty")]
    MissingTransactionId,

    #[error("payment already completed with transaction {0}")]
    AlreadyCompleted(String),

    #[error("payment is {0:?}, expected Pending")]
    NotPending(PaymentStatus),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    #[serde(flatten)]
    identity: AuditableIdentity,
    order_id: Uuid,
    amount_minor: i64,
    currency: String,
    method: PaymentMethod,
    status: PaymentStatus,
    transaction_id: Option<String>,
    failure_reason: Option<String>,
    #[serde(skip)]
    events: PendingEvents<PaymentEvent>,
}

impl Payment {
    pub fn create(
        order_id: Uuid,
        amount_minor: i64,
        currency: &str,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<Self, PaymentError> {
        if amount_minor <= 0 {
            return Err(PaymentError::InvalidAmount);
        }
        let currency = currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PaymentError::InvalidCurrency);
        }

        let identity = AuditableIdentity::new(now);
        let mut payment = Self {
            order_id,
            amount_minor,
            currency: currency.clone(),
            method,
            status: PaymentStatus::Pending,
            transaction_id: None,
            failure_reason: None,
            events: PendingEvents::default(),
            identity,
        };
        payment
            .events
            .record(PaymentEvent::PaymentCreatedV1(PaymentCreatedV1 {
                payment_id: payment.identity.id(),
                order_id,
                amount_minor,
                currency,
                method,
                occurred_on_utc: now,
            }));
        Ok(payment)
    }

    pub fn complete(
        &mut self,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        let transaction_id = transaction_id.trim();
        if transaction_id.is_empty() {
            return Err(PaymentError::MissingTransactionId);
        }
        match self.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Completed if self.transaction_id.as_deref() == Some(transaction_id) => {
                return Ok(());
            }
            PaymentStatus::Completed => {
                return Err(PaymentError::AlreadyCompleted(
                    self.transaction_id.clone().unwrap_or_default(),
                ));
            }
            status => return Err(PaymentError::NotPending(status)),
        }

        self.status = PaymentStatus::Completed;
        self.transaction_id = Some(transaction_id.to_string());
        self.identity.touch(now);
        self.events
            .record(PaymentEvent::PaymentCompletedV1(PaymentCompletedV1 {
                payment_id: self.identity.id(),
                order_id: self.order_id,
                amount_minor: self.amount_minor,
                currency: self.currency.clone(),
                transaction_id: transaction_id.to_string(),
                occurred_on_utc: now,
            }));
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), PaymentError> {
        match self.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Failed => return Ok(()),
            status => return Err(PaymentError::NotPending(status)),
        }

        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason.to_string());
        self.identity.touch(now);
        self.events.record(PaymentEvent::PaymentFailedV1(PaymentFailedV1 {
            payment_id: self.identity.id(),
            order_id: self.order_id,
            reason: reason.to_string(),
            occurred_on_utc: now,
        }));
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.identity.id()
    }

    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn amount_minor(&self) -> i64 {
        self.amount_minor
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}

impl Aggregate for Payment {
    type Event = PaymentEvent;

    const KIND: &'static str = "payment";

    fn identity(&self) -> &AuditableIdentity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut AuditableIdentity {
        &mut self.identity
    }

    fn pending_events(&self) -> &PendingEvents<PaymentEvent> {
        &self.events
    }

    fn pending_events_mut(&mut self) -> &mut PendingEvents<PaymentEvent> {
        &mut self.events
    }
}

#[cfg(test)]
mod payment_tests {
    use super::*;
    use crate::shared::core::aggregate::DomainEvent;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 4, 4, 4, 4).unwrap()
    }

    #[fixture]
    fn payment(now: DateTime<Utc>) -> Payment {
        let mut payment = Payment::create(Uuid::now_v7(), 1_250, "eur", PaymentMethod::Card, now)
            .expect("create failed");
        payment.pending_events_mut().drain();
        payment
    }

    #[rstest]
    fn it_should_create_a_pending_payment_and_raise_created(now: DateTime<Utc>) {
        let order_id = Uuid::now_v7();
        let payment = Payment::create(order_id, 999, "usd", PaymentMethod::Wallet, now).unwrap();

        assert_eq!(payment.status(), PaymentStatus::Pending);
        assert_eq!(payment.currency(), "USD");
        assert_eq!(payment.identity().created_on_utc(), now);
        let events: Vec<&PaymentEvent> = payment.pending_events().iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "PaymentCreated");
        assert_eq!(events[0].aggregate_id(), payment.id());
        assert_eq!(events[0].occurred_on_utc(), now);
    }

    #[rstest]
    #[case(0, "EUR", PaymentError::InvalidAmount)]
    #[case(-5, "EUR", PaymentError::InvalidAmount)]
    #[case(100, "", PaymentError::InvalidCurrency)]
    #[case(100, "EURO", PaymentError::InvalidCurrency)]
    #[case(100, "E1R", PaymentError::InvalidCurrency)]
    fn it_should_reject_invalid_input(
        now: DateTime<Utc>,
        #[case] amount_minor: i64,
        #[case] currency: &str,
        #[case] expected: PaymentError,
    ) {
        let result = Payment::create(
            Uuid::now_v7(),
            amount_minor,
            currency,
            PaymentMethod::Card,
            now,
        );
        assert_eq!(result.unwrap_err(), expected);
    }

    #[rstest]
    fn it_should_complete_a_pending_payment(mut payment: Payment, now: DateTime<Utc>) {
        payment.complete("tx-1", now).unwrap();
        assert_eq!(payment.status(), PaymentStatus::Completed);
        assert_eq!(payment.transaction_id(), Some("tx-1"));
        assert_eq!(payment.identity().modified_on_utc(), Some(now));
        let events = payment.pending_events_mut().drain();
        assert!(matches!(
            events.as_slice(),
            [PaymentEvent::PaymentCompletedV1(e)] if e.transaction_id == "tx-1"
        ));
    }

    #[rstest]
    fn it_should_ignore_a_duplicate_completion(mut payment: Payment, now: DateTime<Utc>) {
        payment.complete("tx-1", now).unwrap();
        payment.pending_events_mut().drain();

        assert_eq!(payment.complete("tx-1", now), Ok(()));
        assert!(payment.pending_events().is_empty());
        assert_eq!(
            payment.complete("tx-2", now),
            Err(PaymentError::AlreadyCompleted("tx-1".into()))
        );
    }

    #[rstest]
    fn it_should_require_a_transaction_id(mut payment: Payment, now: DateTime<Utc>) {
        assert_eq!(
            payment.complete("  ", now),
            Err(PaymentError::MissingTransactionId)
        );
        assert_eq!(payment.status(), PaymentStatus::Pending);
    }

    #[rstest]
    fn it_should_fail_a_pending_payment(mut payment: Payment, now: DateTime<Utc>) {
        payment.mark_failed("card declined", now).unwrap();
        assert_eq!(payment.status(), PaymentStatus::Failed);
        assert_eq!(payment.failure_reason(), Some("card declined"));
        assert_eq!(payment.pending_events().len(), 1);

        assert_eq!(payment.mark_failed("again", now), Ok(()));
        assert_eq!(payment.pending_events().len(), 1);
    }

    #[rstest]
    fn it_should_not_leave_a_terminal_state(mut payment: Payment, now: DateTime<Utc>) {
        payment.mark_failed("card declined", now).unwrap();
        assert_eq!(
            payment.complete("tx-1", now),
            Err(PaymentError::NotPending(PaymentStatus::Failed))
        );

        let mut completed =
            Payment::create(Uuid::now_v7(), 1, "EUR", PaymentMethod::Card, now).unwrap();
        completed.complete("tx-9", now).unwrap();
        assert_eq!(
            completed.mark_failed("too late", now),
            Err(PaymentError::NotPending(PaymentStatus::Completed))
        );
        assert_eq!(completed.status(), PaymentStatus::Completed);
    }

    #[rstest]
    fn it_should_round_trip_without_pending_events(mut payment: Payment, now: DateTime<Utc>) {
        payment.complete("tx-1", now).unwrap();
        let json = serde_json::to_value(&payment).unwrap();
        let restored: Payment = serde_json::from_value(json).unwrap();
        assert_eq!(restored.id(), payment.id());
        assert_eq!(restored.status(), PaymentStatus::Completed);
        assert!(restored.pending_events().is_empty());
    }
}
