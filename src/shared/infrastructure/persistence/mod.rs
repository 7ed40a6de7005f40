// Persistence session: the unit that commits an aggregate's state and its outbox rows together.
//
// Responsibilities
// - UnitOfWork: one atomic write of a document plus any number of outbox rows, with optimistic
//   concurrency on the document version.
// - AggregateRepository (repository.rs): load/save aggregates through a UnitOfWork and drain
//   their pending events only after the commit succeeded.

use async_trait::async_trait;
use serde_json::Value as Json;
use thiserror::Error;
use uuid::Uuid;

use crate::shared::infrastructure::outbox::OutboxMessage;

pub mod in_memory;
pub mod repository;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("version conflict on {kind} {id}: expected {expected}, actual {actual}")]
    VersionConflict {
        kind: &'static str,
        id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub version: i64,
    pub body: Json,
}

#[derive(Debug, Clone)]
pub struct DocumentWrite {
    pub kind: &'static str,
    pub id: Uuid,
    pub expected_version: i64,
    pub body: Json,
}

/// Everything one commit writes.
#[derive(Debug, Clone)]
pub struct Changeset {
    pub document: DocumentWrite,
    pub outbox: Vec<OutboxMessage>,
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn load_document(
        &self,
        kind: &'static str,
        id: Uuid,
    ) -> Result<Option<StoredDocument>, PersistenceError>;

    /// Writes the document at `expected_version + 1` and inserts the outbox rows, all or nothing.
    async fn commit(&self, changeset: Changeset) -> Result<(), PersistenceError>;
}
