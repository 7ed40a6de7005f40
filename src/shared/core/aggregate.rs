// Building blocks every aggregate is composed of.
//
// Purpose
// - AuditableIdentity: identity, audit timestamps and the persistence version.
// - PendingEvents: the explicit buffer of domain events raised during one unit of work.
// - DomainEvent / Aggregate: the traits infrastructure relies on to persist an aggregate and
//   turn its events into outbox rows.
//
// Boundaries
// - No input or output here. The buffer is drained by the repository, and only after the
//   commit that persisted the state change succeeded.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditableIdentity {
    id: Uuid,
    created_on_utc: DateTime<Utc>,
    modified_on_utc: Option<DateTime<Utc>>,
    #[serde(skip)]
    version: i64,
}

impl AuditableIdentity {
    pub fn new(created_on_utc: DateTime<Utc>) -> Self {
        Self::with_id(Uuid::now_v7(), created_on_utc)
    }

    pub fn with_id(id: Uuid, created_on_utc: DateTime<Utc>) -> Self {
        Self {
            id,
            created_on_utc,
            modified_on_utc: None,
            version: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_on_utc(&self) -> DateTime<Utc> {
        self.created_on_utc
    }

    pub fn modified_on_utc(&self) -> Option<DateTime<Utc>> {
        self.modified_on_utc
    }

    /// Number of successful commits of this aggregate. Zero until first saved.
    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.modified_on_utc = Some(at);
    }

    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

/// Ordered buffer of domain events not yet handed to infrastructure.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvents<E> {
    events: Vec<E>,
}

impl<E> Default for PendingEvents<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> PendingEvents<E> {
    pub fn record(&mut self, event: E) {
        self.events.push(event);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns every buffered event in the order raised and leaves the buffer empty.
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
    }
}

pub trait DomainEvent: Clone + Send + Sync {
    /// Stable tag, later used as the outbox row's event type.
    fn event_type(&self) -> &'static str;
    fn occurred_on_utc(&self) -> DateTime<Utc>;
    fn aggregate_id(&self) -> Uuid;
}

pub trait Aggregate: Serialize + DeserializeOwned + Send + Sync {
    type Event: DomainEvent;

    /// Document kind the aggregate is stored under.
    const KIND: &'static str;

    fn identity(&self) -> &AuditableIdentity;
    fn identity_mut(&mut self) -> &mut AuditableIdentity;
    fn pending_events(&self) -> &PendingEvents<Self::Event>;
    fn pending_events_mut(&mut self) -> &mut PendingEvents<Self::Event>;
}
