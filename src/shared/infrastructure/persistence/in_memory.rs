// In memory database backing both the UnitOfWork and the OutboxStore ports.
//
// Purpose
// - Support tests and local development without a database.
//
// Responsibilities
// - Keep aggregate documents and outbox rows behind one lock so a commit is atomic.
// - Can be switched offline to simulate backend failures.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::shared::core::clock::{Clock, SystemClock};
use crate::shared::infrastructure::outbox::{DEFAULT_CLAIM_TIMEOUT, OutboxMessage};
use crate::shared::infrastructure::persistence::{
    Changeset, PersistenceError, StoredDocument, UnitOfWork,
};

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) documents: HashMap<(&'static str, Uuid), StoredDocument>,
    pub(crate) outbox: Vec<OutboxMessage>,
}

pub struct InMemoryDatabase {
    pub(crate) tables: RwLock<Tables>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) claim_timeout: Duration,
    offline: AtomicBool,
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock: Arc::new(SystemClock),
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
            offline: AtomicBool::new(false),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_claim_timeout(mut self, claim_timeout: Duration) -> Self {
        self.claim_timeout = claim_timeout;
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Snapshot of the outbox table in insertion order.
    pub async fn outbox_rows(&self) -> Vec<OutboxMessage> {
        self.tables.read().await.outbox.clone()
    }

    fn ensure_online(&self) -> Result<(), PersistenceError> {
        if self.is_offline() {
            return Err(PersistenceError::Backend("Database offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryDatabase {
    async fn load_document(
        &self,
        kind: &'static str,
        id: Uuid,
    ) -> Result<Option<StoredDocument>, PersistenceError> {
        self.ensure_online()?;
        Ok(self.tables.read().await.documents.get(&(kind, id)).cloned())
    }

    async fn commit(&self, changeset: Changeset) -> Result<(), PersistenceError> {
        self.ensure_online()?;
        let Changeset { document, outbox } = changeset;
        let mut tables = self.tables.write().await;
        let key = (document.kind, document.id);
        let actual = tables.documents.get(&key).map(|d| d.version).unwrap_or(0);
        if actual != document.expected_version {
            return Err(PersistenceError::VersionConflict {
                kind: document.kind,
                id: document.id,
                expected: document.expected_version,
                actual,
            });
        }
        tables.documents.insert(
            key,
            StoredDocument {
                version: document.expected_version + 1,
                body: document.body,
            },
        );
        tables.outbox.extend(outbox);
        Ok(())
    }
}

#[cfg(test)]
mod in_memory_database_tests {
    use super::*;
    use crate::shared::infrastructure::persistence::DocumentWrite;
    use chrono::Utc;
    use rstest::{fixture, rstest};
    use serde_json::json;

    const KIND: &str = "widget";

    #[fixture]
    fn changeset() -> Changeset {
        Changeset {
            document: DocumentWrite {
                kind: KIND,
                id: Uuid::now_v7(),
                expected_version: 0,
                body: json!({ "name": "first" }),
            },
            outbox: vec![OutboxMessage::new("WidgetCreated", "{}", Utc::now(), 3)],
        }
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_commit_the_document_and_the_outbox_rows(changeset: Changeset) {
        let db = InMemoryDatabase::new();
        let id = changeset.document.id;
        db.commit(changeset).await.expect("commit failed");

        let stored = db.load_document(KIND, id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.body, json!({ "name": "first" }));
        assert_eq!(db.outbox_rows().await.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_write_nothing_on_a_version_conflict(changeset: Changeset) {
        let db = InMemoryDatabase::new();
        let id = changeset.document.id;
        db.commit(changeset.clone()).await.unwrap();

        let result = db.commit(changeset).await;
        assert!(matches!(
            result,
            Err(PersistenceError::VersionConflict {
                expected: 0,
                actual: 1,
                ..
            })
        ));
        assert_eq!(db.outbox_rows().await.len(), 1);
        assert_eq!(db.load_document(KIND, id).await.unwrap().unwrap().version, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_fail_if_the_database_is_offline(changeset: Changeset) {
        let db = InMemoryDatabase::new();
        db.set_offline(true);
        let result = db.commit(changeset).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "backend error: Database offline"
        );
        db.set_offline(false);
        assert!(db.outbox_rows().await.is_empty());
    }
}
