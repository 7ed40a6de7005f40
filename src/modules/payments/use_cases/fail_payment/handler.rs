use std::sync::Arc;

use crate::modules::payments::adapters::outbound::integration_events::PaymentRepository;
use crate::modules::payments::use_cases::errors::ApplicationError;
use crate::modules::payments::use_cases::fail_payment::command::FailPayment;
use crate::shared::core::clock::Clock;
use crate::shared::infrastructure::persistence::UnitOfWork;

pub struct FailPaymentHandler<U>
where
    U: UnitOfWork + 'static,
{
    repository: Arc<PaymentRepository<U>>,
    clock: Arc<dyn Clock>,
}

impl<U> FailPaymentHandler<U>
where
    U: UnitOfWork + 'static,
{
    pub fn new(repository: Arc<PaymentRepository<U>>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn handle(&self, command: FailPayment) -> Result<usize, ApplicationError> {
        let mut payment = self
            .repository
            .load(command.payment_id)
            .await?
            .ok_or(ApplicationError::NotFound(command.payment_id))?;
        payment.mark_failed(&command.reason, self.clock.now())?;
        Ok(self.repository.save(&mut payment).await?)
    }
}
