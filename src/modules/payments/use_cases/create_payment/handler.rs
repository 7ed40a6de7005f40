use std::sync::Arc;
use uuid::Uuid;

use crate::modules::payments::adapters::outbound::integration_events::PaymentRepository;
use crate::modules::payments::core::payment::Payment;
use crate::modules::payments::use_cases::create_payment::command::CreatePayment;
use crate::modules::payments::use_cases::errors::ApplicationError;
use crate::shared::core::clock::Clock;
use crate::shared::infrastructure::persistence::UnitOfWork;

pub struct CreatePaymentHandler<U>
where
    U: UnitOfWork + 'static,
{
    repository: Arc<PaymentRepository<U>>,
    clock: Arc<dyn Clock>,
}

impl<U> CreatePaymentHandler<U>
where
    U: UnitOfWork + 'static,
{
    pub fn new(repository: Arc<PaymentRepository<U>>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Creates the payment and enqueues `PaymentCreated` in the same commit.
    pub async fn handle(&self, command: CreatePayment) -> Result<Uuid, ApplicationError> {
        let mut payment = Payment::create(
            command.order_id,
            command.amount_minor,
            &command.currency,
            command.method,
            self.clock.now(),
        )?;
        self.repository.save(&mut payment).await?;
        Ok(payment.id())
    }
}
