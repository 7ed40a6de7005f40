// Loads and saves aggregates, writing their outbox rows in the same commit.
//
// Save sequence
// 1. Translate the aggregate's pending events into outbox rows (no draining yet).
// 2. Commit the document and the rows as one unit of work.
// 3. Only on success: drain the pending events and advance the version.
// A failed commit leaves both the store and the aggregate's buffer untouched.

use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::shared::core::aggregate::Aggregate;
use crate::shared::infrastructure::integration_event::{
    IntegrationEventTranslator, TranslationError,
};
use crate::shared::infrastructure::outbox::translator::OutboxTranslator;
use crate::shared::infrastructure::persistence::{
    Changeset, DocumentWrite, PersistenceError, UnitOfWork,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error("corrupt {kind} document {id}: {source}")]
    Corrupt {
        kind: &'static str,
        id: Uuid,
        #[source]
        source: serde_json::Error,
    },
}

pub struct AggregateRepository<A, T, U> {
    unit_of_work: Arc<U>,
    translator: OutboxTranslator<T>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A, T, U> AggregateRepository<A, T, U>
where
    A: Aggregate,
    T: IntegrationEventTranslator<A::Event>,
    U: UnitOfWork,
{
    pub fn new(unit_of_work: Arc<U>, translator: OutboxTranslator<T>) -> Self {
        Self {
            unit_of_work,
            translator,
            _aggregate: PhantomData,
        }
    }

    pub async fn load(&self, id: Uuid) -> Result<Option<A>, RepositoryError> {
        let Some(stored) = self.unit_of_work.load_document(A::KIND, id).await? else {
            return Ok(None);
        };
        let mut aggregate: A =
            serde_json::from_value(stored.body).map_err(|source| RepositoryError::Corrupt {
                kind: A::KIND,
                id,
                source,
            })?;
        aggregate.identity_mut().set_version(stored.version);
        Ok(Some(aggregate))
    }

    /// Persists the aggregate and its outbox rows atomically. Returns the number of rows written.
    pub async fn save(&self, aggregate: &mut A) -> Result<usize, RepositoryError> {
        let id = aggregate.identity().id();
        let expected_version = aggregate.identity().version();
        let outbox = self
            .translator
            .to_outbox_messages(aggregate.pending_events().iter())?;
        let body = serde_json::to_value(&*aggregate).map_err(|source| RepositoryError::Corrupt {
            kind: A::KIND,
            id,
            source,
        })?;
        let written = outbox.len();

        self.unit_of_work
            .commit(Changeset {
                document: DocumentWrite {
                    kind: A::KIND,
                    id,
                    expected_version,
                    body,
                },
                outbox,
            })
            .await?;

        aggregate.identity_mut().set_version(expected_version + 1);
        let drained = aggregate.pending_events_mut().drain();
        tracing::info!(
            kind = A::KIND,
            aggregate_id = %id,
            version = expected_version + 1,
            events = drained.len(),
            "aggregate committed"
        );
        Ok(written)
    }
}
