// Outbox dispatcher drains due outbox rows and publishes them.
//
// Cycle
// 1. Claim never-attempted rows first, then fill the batch with retry-eligible rows.
// 2. Decode each row and publish it, up to `publish_concurrency` at a time, in batch order.
// 3. Mark successes processed; record failures with backoff or dead-letter them.
// 4. Release rows abandoned because of shutdown, persist the outcomes, sleep, repeat.
//
// Failure policy
// - Store errors are logged and the cycle yields an empty report; the loop keeps going.
// - A message's failure never affects the rest of its batch.
// - Undecodable content is dead-lettered at once, retrying cannot fix it.

use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use crate::shared::core::clock::Clock;
use crate::shared::infrastructure::event_bus::EventPublisher;
use crate::shared::infrastructure::integration_event::IntegrationEvent;
use crate::shared::infrastructure::outbox::backoff::random_jitter;
use crate::shared::infrastructure::outbox::{
    FailedAttempt, MessageOutcome, OutboxError, OutboxMessage, OutboxStore,
};
use crate::shared::infrastructure::shutdown::{Shutdown, WorkerHandle};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub publish_concurrency: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            poll_interval: Duration::from_secs(1),
            publish_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub claimed: usize,
    pub published: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    pub released: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Published,
    Retried,
    DeadLettered,
    Abandoned,
}

pub struct OutboxDispatcher<S, P> {
    name: String,
    store: Arc<S>,
    publisher: Arc<P>,
    clock: Arc<dyn Clock>,
    config: DispatcherConfig,
}

impl<S, P> OutboxDispatcher<S, P>
where
    S: OutboxStore + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(
        name: impl Into<String>,
        store: Arc<S>,
        publisher: Arc<P>,
        clock: Arc<dyn Clock>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            publisher,
            clock,
            config,
        }
    }

    /// Moves the dispatcher onto its own task. The store and publisher handles are released
    /// when the returned handle is stopped.
    pub fn start(self) -> WorkerHandle {
        let name = self.name.clone();
        WorkerHandle::spawn(name, move |shutdown| async move { self.run(shutdown).await })
    }

    pub async fn run(&self, shutdown: Shutdown) {
        tracing::info!(
            worker = %self.name,
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "outbox dispatcher started"
        );
        while !shutdown.is_cancelled() {
            let report = self.run_once(&shutdown).await;
            if report.claimed > 0 {
                tracing::info!(
                    worker = %self.name,
                    claimed = report.claimed,
                    published = report.published,
                    retried = report.retried,
                    dead_lettered = report.dead_lettered,
                    released = report.released,
                    "outbox batch dispatched"
                );
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.config.poll_interval) => {}
            }
        }
        tracing::info!(worker = %self.name, "outbox dispatcher stopped");
    }

    /// One claim-publish-persist cycle.
    pub async fn run_once(&self, shutdown: &Shutdown) -> DispatchReport {
        let claimed = match self.claim_batch(shutdown).await {
            Ok(claimed) => claimed,
            Err(error) => {
                tracing::warn!(worker = %self.name, %error, "claiming outbox messages failed");
                return DispatchReport::default();
            }
        };
        if claimed.is_empty() {
            return DispatchReport::default();
        }

        let mut report = DispatchReport {
            claimed: claimed.len(),
            ..DispatchReport::default()
        };
        let dispatches: Vec<_> = claimed
            .into_iter()
            .map(|message| self.dispatch_one(message, shutdown))
            .collect();
        let results: Vec<(MessageOutcome, Outcome)> = stream::iter(dispatches)
            .buffered(self.config.publish_concurrency.max(1))
            .collect()
            .await;

        let mut outcomes = Vec::with_capacity(results.len());
        let mut abandoned = Vec::new();
        for (result, outcome) in results {
            match outcome {
                Outcome::Published => report.published += 1,
                Outcome::Retried => report.retried += 1,
                Outcome::DeadLettered => report.dead_lettered += 1,
                Outcome::Abandoned => {
                    abandoned.push(result.message.id);
                    continue;
                }
            }
            outcomes.push(result);
        }

        report.released = self.release_abandoned(&abandoned).await;
        if !outcomes.is_empty() {
            if let Err(error) = self.store.save_outcomes(&outcomes).await {
                tracing::error!(
                    worker = %self.name,
                    %error,
                    messages = outcomes.len(),
                    "persisting outbox outcomes failed; rows will be re-dispatched after their lease expires"
                );
                return DispatchReport {
                    claimed: report.claimed,
                    released: report.released,
                    ..DispatchReport::default()
                };
            }
        }
        report
    }

    async fn release_abandoned(&self, ids: &[Uuid]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        match self.store.release_claims(ids).await {
            Ok(released) => released,
            Err(error) => {
                tracing::warn!(worker = %self.name, %error, "releasing abandoned claims failed");
                0
            }
        }
    }

    async fn claim_batch(&self, shutdown: &Shutdown) -> Result<Vec<OutboxMessage>, OutboxError> {
        let batch_size = self.config.batch_size;
        let mut batch = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(Vec::new()),
            pending = self.store.claim_pending(batch_size) => pending?,
        };

        let remaining = batch_size.saturating_sub(batch.len());
        if remaining == 0 || shutdown.is_cancelled() {
            return Ok(batch);
        }
        match self.store.claim_retry_eligible(remaining).await {
            Ok(retries) => batch.extend(retries),
            // Keep what was already claimed rather than stranding it until lease expiry.
            Err(error) if !batch.is_empty() => {
                tracing::warn!(worker = %self.name, %error, "claiming retry-eligible messages failed")
            }
            Err(error) => return Err(error),
        }
        Ok(batch)
    }

    /// Works one claimed row. The lease it was claimed under travels with the result so the
    /// store can drop the outcome if the row was reclaimed in the meantime.
    async fn dispatch_one(
        &self,
        mut message: OutboxMessage,
        shutdown: &Shutdown,
    ) -> (MessageOutcome, Outcome) {
        let held_claim = message.claimed_on_utc;
        let outcome = self.deliver(&mut message, shutdown).await;
        (
            MessageOutcome {
                message,
                held_claim,
            },
            outcome,
        )
    }

    async fn deliver(&self, message: &mut OutboxMessage, shutdown: &Shutdown) -> Outcome {
        let envelope = match decode(message) {
            Ok(envelope) => envelope,
            Err(reason) => {
                message.mark_permanently_failed(&reason);
                tracing::error!(
                    worker = %self.name,
                    message_id = %message.id,
                    event_type = %message.event_type,
                    %reason,
                    "outbox message dead-lettered: undecodable"
                );
                return Outcome::DeadLettered;
            }
        };
        if shutdown.is_cancelled() {
            return Outcome::Abandoned;
        }

        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Outcome::Abandoned,
            result = self.publisher.publish(&message.event_type, &envelope) => result,
        };

        let now = self.clock.now();
        let error = match result {
            Ok(()) => {
                message.mark_processed(now);
                tracing::debug!(
                    worker = %self.name,
                    message_id = %message.id,
                    event_type = %message.event_type,
                    "outbox message published"
                );
                return Outcome::Published;
            }
            Err(error) => error,
        };

        let reason = error.to_string();
        match message.record_failed_attempt(&reason, now, random_jitter()) {
            FailedAttempt::Rescheduled {
                next_attempt_on_utc,
            } => {
                tracing::warn!(
                    worker = %self.name,
                    message_id = %message.id,
                    event_type = %message.event_type,
                    attempt_count = message.attempt_count,
                    %next_attempt_on_utc,
                    %error,
                    "publishing outbox message failed; retry scheduled"
                );
                Outcome::Retried
            }
            FailedAttempt::DeadLettered => {
                tracing::error!(
                    worker = %self.name,
                    message_id = %message.id,
                    event_type = %message.event_type,
                    attempt_count = message.attempt_count,
                    %error,
                    "outbox message dead-lettered: retry budget exhausted"
                );
                Outcome::DeadLettered
            }
            FailedAttempt::Ignored => Outcome::Abandoned,
        }
    }
}

fn decode(message: &OutboxMessage) -> Result<IntegrationEvent, String> {
    let envelope: IntegrationEvent = serde_json::from_str(&message.content)
        .map_err(|error| format!("undecodable content: {error}"))?;
    if envelope.event_type != message.event_type {
        return Err(format!(
            "event type mismatch: row says {}, content says {}",
            message.event_type, envelope.event_type
        ));
    }
    Ok(envelope)
}
