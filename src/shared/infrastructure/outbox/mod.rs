// Outbox: durable record of integration events still to be delivered.
//
// Purpose
// - OutboxStore: the storage contract dispatchers and operators code against.
// - The message lifecycle, backoff arithmetic, translation from domain events and the
//   dispatcher loop live in the submodules.
//
// Concurrency
// - Several dispatchers may share one store. A claim is a lease (timestamp + timeout), not a
//   lock: a crashed worker's rows become claimable again once the lease expires. Delivery is
//   at-least-once and unordered across batches.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub mod backoff;
pub mod dispatcher;
pub mod in_memory;
pub mod message;
pub mod sweeper;
pub mod translator;

pub use message::{FailedAttempt, OutboxMessage};

pub const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A row as a dispatcher left it, with the lease value it was handed when claiming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOutcome {
    pub message: OutboxMessage,
    pub held_claim: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("outbox message {0} not found")]
    NotFound(Uuid),

    #[error("outbox message {0} is not permanently failed")]
    NotDeadLettered(Uuid),

    #[error("transient backend error: {0}")]
    Transient(String),

    #[error("backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Durable single-row insert.
    async fn add_message(&self, message: OutboxMessage) -> Result<(), OutboxError>;

    /// Never-attempted rows with no live lease, oldest first. Claimed rows are returned with
    /// their lease already persisted.
    async fn claim_pending(&self, batch_size: usize) -> Result<Vec<OutboxMessage>, OutboxError>;

    /// Rows with retry budget left whose backoff has elapsed and that carry no live lease,
    /// earliest due first.
    async fn claim_retry_eligible(
        &self,
        batch_size: usize,
    ) -> Result<Vec<OutboxMessage>, OutboxError>;

    /// Drops the lease on the given rows without touching anything else.
    async fn release_claims(&self, ids: &[Uuid]) -> Result<usize, OutboxError>;

    /// Drops every lease on an unprocessed row older than `claim_timeout`.
    async fn release_expired_claims(&self, claim_timeout: Duration) -> Result<usize, OutboxError>;

    /// Persists dispatcher outcomes. An outcome is applied only while the stored row still
    /// carries the lease it was produced under; stale outcomes are dropped.
    async fn save_outcomes(&self, outcomes: &[MessageOutcome]) -> Result<(), OutboxError>;

    async fn get(&self, id: Uuid) -> Result<Option<OutboxMessage>, OutboxError>;

    /// Dead letters awaiting operator triage, oldest first.
    async fn permanently_failed(&self, limit: usize) -> Result<Vec<OutboxMessage>, OutboxError>;

    /// Resets a dead letter so dispatchers pick it up again.
    async fn requeue(&self, id: Uuid) -> Result<(), OutboxError>;

    /// Deletes processed rows processed before `cutoff`.
    async fn purge_processed(&self, cutoff: DateTime<Utc>) -> Result<usize, OutboxError>;
}
