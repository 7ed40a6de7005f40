use thiserror::Error;
use uuid::Uuid;

use crate::modules::payments::core::payment::PaymentError;
use crate::shared::infrastructure::persistence::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("payment {0} not found")]
    NotFound(Uuid),

    #[error("domain rejected: {0}")]
    Domain(#[from] PaymentError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
