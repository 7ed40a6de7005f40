// Periodic release of leases left behind by crashed workers.
//
// Dispatchers already re-claim rows whose lease expired; the sweeper clears such leases on
// its own schedule so the table reflects reality even when no dispatcher is polling.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

use crate::shared::infrastructure::outbox::OutboxStore;
use crate::shared::infrastructure::shutdown::{Shutdown, WorkerHandle};

/// Shortest accepted sweep period; `tokio::time::interval` rejects a zero period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

pub struct ClaimSweeper<S> {
    store: Arc<S>,
    claim_timeout: Duration,
    every: Duration,
}

impl<S> ClaimSweeper<S>
where
    S: OutboxStore + 'static,
{
    /// `every` is raised to one millisecond when given as zero.
    pub fn new(store: Arc<S>, claim_timeout: Duration, every: Duration) -> Self {
        Self {
            store,
            claim_timeout,
            every: every.max(MIN_SWEEP_INTERVAL),
        }
    }

    pub fn start(self) -> WorkerHandle {
        WorkerHandle::spawn("outbox-claim-sweeper", move |shutdown| async move {
            self.run(shutdown).await
        })
    }

    pub async fn run(&self, shutdown: Shutdown) {
        tracing::info!(
            claim_timeout_secs = self.claim_timeout.as_secs(),
            every_ms = self.every.as_millis() as u64,
            "outbox claim sweeper started"
        );
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }
        tracing::info!("outbox claim sweeper stopped");
    }

    /// Returns the number of leases released; store errors count as zero.
    pub async fn sweep_once(&self) -> usize {
        match self.store.release_expired_claims(self.claim_timeout).await {
            Ok(0) => 0,
            Ok(released) => {
                tracing::warn!(released, "released expired outbox claims");
                released
            }
            Err(error) => {
                tracing::warn!(%error, "sweeping expired outbox claims failed");
                0
            }
        }
    }
}
