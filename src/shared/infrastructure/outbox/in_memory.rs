// In memory implementation of the OutboxStore port on top of InMemoryDatabase.
//
// Claiming is two steps, like a query-then-update against a real table: candidates are
// selected under a read lock, then each lease is written under the write lock only if the
// row's claim still holds the value observed during selection (compare-and-set). A row
// grabbed by another worker in between is skipped instead of double-claimed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use uuid::Uuid;

use crate::shared::core::clock::{Clock, to_chrono};
use crate::shared::infrastructure::outbox::{
    MessageOutcome, OutboxError, OutboxMessage, OutboxStore,
};
use crate::shared::infrastructure::persistence::in_memory::InMemoryDatabase;

/// Row id plus the claim value seen when it was selected.
type Candidate = (Uuid, Option<DateTime<Utc>>);

/// Candidates gathered per requested retry slot before re-sorting by due time.
const RETRY_OVERSAMPLING: usize = 2;

fn select_pending(
    rows: &[OutboxMessage],
    now: DateTime<Utc>,
    claim_timeout: chrono::Duration,
    batch_size: usize,
) -> Vec<Candidate> {
    let mut candidates: Vec<&OutboxMessage> = rows
        .iter()
        .filter(|m| m.attempt_count == 0 && m.is_claimable(now, claim_timeout))
        .collect();
    candidates.sort_by_key(|m| (m.occurred_on_utc, m.id));
    candidates
        .into_iter()
        .take(batch_size)
        .map(|m| (m.id, m.claimed_on_utc))
        .collect()
}

fn select_retry_eligible(
    rows: &[OutboxMessage],
    now: DateTime<Utc>,
    claim_timeout: chrono::Duration,
    batch_size: usize,
) -> Vec<Candidate> {
    let mut candidates: Vec<&OutboxMessage> = rows
        .iter()
        .filter(|m| m.is_due(now) && m.is_claimable(now, claim_timeout))
        .collect();
    candidates.sort_by_key(|m| (m.occurred_on_utc, m.id));
    candidates.truncate(batch_size.saturating_mul(RETRY_OVERSAMPLING));
    candidates.sort_by_key(|m| (m.due_on_utc(), m.occurred_on_utc, m.id));
    candidates
        .into_iter()
        .take(batch_size)
        .map(|m| (m.id, m.claimed_on_utc))
        .collect()
}

fn index_by_id(rows: &[OutboxMessage]) -> HashMap<Uuid, usize> {
    rows.iter().enumerate().map(|(i, m)| (m.id, i)).collect()
}

impl InMemoryDatabase {
    fn ensure_outbox_online(&self) -> Result<(), OutboxError> {
        if self.is_offline() {
            return Err(OutboxError::Transient("Outbox store offline".into()));
        }
        Ok(())
    }

    async fn claim_candidates(
        &self,
        select: fn(&[OutboxMessage], DateTime<Utc>, chrono::Duration, usize) -> Vec<Candidate>,
        batch_size: usize,
    ) -> Result<Vec<OutboxMessage>, OutboxError> {
        self.ensure_outbox_online()?;
        if batch_size == 0 {
            return Ok(Vec::new());
        }
        let claim_timeout = to_chrono(self.claim_timeout);
        let now = self.clock.now();
        let candidates = {
            let tables = self.tables.read().await;
            select(&tables.outbox, now, claim_timeout, batch_size)
        };
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut tables = self.tables.write().await;
        let index = index_by_id(&tables.outbox);
        let mut claimed = Vec::with_capacity(candidates.len());
        for (id, observed_claim) in candidates {
            let Some(&i) = index.get(&id) else { continue };
            let row = &mut tables.outbox[i];
            if row.claimed_on_utc != observed_claim || !row.is_claimable(now, claim_timeout) {
                tracing::debug!(message_id = %id, "claim lost to another worker");
                continue;
            }
            row.claim(now);
            claimed.push(row.clone());
        }
        Ok(claimed)
    }
}

#[async_trait]
impl OutboxStore for InMemoryDatabase {
    async fn add_message(&self, message: OutboxMessage) -> Result<(), OutboxError> {
        self.ensure_outbox_online()?;
        self.tables.write().await.outbox.push(message);
        Ok(())
    }

    async fn claim_pending(&self, batch_size: usize) -> Result<Vec<OutboxMessage>, OutboxError> {
        self.claim_candidates(select_pending, batch_size).await
    }

    async fn claim_retry_eligible(
        &self,
        batch_size: usize,
    ) -> Result<Vec<OutboxMessage>, OutboxError> {
        self.claim_candidates(select_retry_eligible, batch_size).await
    }

    async fn release_claims(&self, ids: &[Uuid]) -> Result<usize, OutboxError> {
        self.ensure_outbox_online()?;
        let ids: HashSet<&Uuid> = ids.iter().collect();
        let mut tables = self.tables.write().await;
        let mut released = 0;
        for row in tables.outbox.iter_mut() {
            if ids.contains(&row.id) && !row.is_processed() && row.claimed_on_utc.is_some() {
                row.release_claim();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn release_expired_claims(&self, claim_timeout: Duration) -> Result<usize, OutboxError> {
        self.ensure_outbox_online()?;
        let claim_timeout = to_chrono(claim_timeout);
        let now = self.clock.now();
        let mut tables = self.tables.write().await;
        let mut released = 0;
        for row in tables.outbox.iter_mut() {
            if !row.is_processed()
                && row.claimed_on_utc.is_some()
                && !row.has_active_claim(now, claim_timeout)
            {
                row.release_claim();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn save_outcomes(&self, outcomes: &[MessageOutcome]) -> Result<(), OutboxError> {
        self.ensure_outbox_online()?;
        let mut tables = self.tables.write().await;
        let index = index_by_id(&tables.outbox);
        for MessageOutcome {
            message,
            held_claim,
        } in outcomes
        {
            let Some(&i) = index.get(&message.id) else {
                tracing::warn!(message_id = %message.id, "outcome for unknown outbox message dropped");
                continue;
            };
            let row = &mut tables.outbox[i];
            if row.claimed_on_utc != *held_claim
                || row.is_processed()
                || row.is_permanently_failed()
                || message.attempt_count < row.attempt_count
            {
                tracing::debug!(message_id = %message.id, "stale outbox outcome dropped");
                continue;
            }
            *row = message.clone();
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<OutboxMessage>, OutboxError> {
        self.ensure_outbox_online()?;
        let tables = self.tables.read().await;
        Ok(tables.outbox.iter().find(|m| m.id == id).cloned())
    }

    async fn permanently_failed(&self, limit: usize) -> Result<Vec<OutboxMessage>, OutboxError> {
        self.ensure_outbox_online()?;
        let tables = self.tables.read().await;
        let mut failed: Vec<OutboxMessage> = tables
            .outbox
            .iter()
            .filter(|m| m.is_permanently_failed())
            .cloned()
            .collect();
        failed.sort_by_key(|m| (m.occurred_on_utc, m.id));
        failed.truncate(limit);
        Ok(failed)
    }

    async fn requeue(&self, id: Uuid) -> Result<(), OutboxError> {
        self.ensure_outbox_online()?;
        let mut tables = self.tables.write().await;
        let row = tables
            .outbox
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(OutboxError::NotFound(id))?;
        if !row.is_permanently_failed() {
            return Err(OutboxError::NotDeadLettered(id));
        }
        row.requeue();
        Ok(())
    }

    async fn purge_processed(&self, cutoff: DateTime<Utc>) -> Result<usize, OutboxError> {
        self.ensure_outbox_online()?;
        let mut tables = self.tables.write().await;
        let before = tables.outbox.len();
        tables
            .outbox
            .retain(|m| m.processed_on_utc.is_none_or(|processed| processed >= cutoff));
        Ok(before - tables.outbox.len())
    }
}
