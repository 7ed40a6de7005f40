use std::sync::Arc;

use crate::modules::payments::adapters::outbound::integration_events::PaymentRepository;
use crate::modules::payments::use_cases::complete_payment::command::CompletePayment;
use crate::modules::payments::use_cases::errors::ApplicationError;
use crate::shared::core::clock::Clock;
use crate::shared::infrastructure::persistence::UnitOfWork;

pub struct CompletePaymentHandler<U>
where
    U: UnitOfWork + 'static,
{
    repository: Arc<PaymentRepository<U>>,
    clock: Arc<dyn Clock>,
}

impl<U> CompletePaymentHandler<U>
where
    U: UnitOfWork + 'static,
{
    pub fn new(repository: Arc<PaymentRepository<U>>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Returns the number of outbox rows written; zero when the completion was a repeat.
    pub async fn handle(&self, command: CompletePayment) -> Result<usize, ApplicationError> {
        let mut payment = self
            .repository
            .load(command.payment_id)
            .await?
            .ok_or(ApplicationError::NotFound(command.payment_id))?;
        payment.complete(&command.transaction_id, self.clock.now())?;
        Ok(self.repository.save(&mut payment).await?)
    }
}
