// Background workers of the outbox: N dispatchers sharing one store, plus one claim sweeper.

use std::sync::Arc;

use crate::shared::core::clock::Clock;
use crate::shared::infrastructure::event_bus::EventPublisher;
use crate::shared::infrastructure::outbox::OutboxStore;
use crate::shared::infrastructure::outbox::dispatcher::OutboxDispatcher;
use crate::shared::infrastructure::outbox::sweeper::ClaimSweeper;
use crate::shared::infrastructure::shutdown::WorkerHandle;
use crate::shell::config::OutboxConfig;

pub struct OutboxWorkers {
    handles: Vec<WorkerHandle>,
}

impl OutboxWorkers {
    pub fn start<S, P>(
        config: &OutboxConfig,
        store: Arc<S>,
        publisher: Arc<P>,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        S: OutboxStore + 'static,
        P: EventPublisher + 'static,
    {
        let mut handles: Vec<WorkerHandle> = (0..config.workers)
            .map(|n| {
                OutboxDispatcher::new(
                    format!("outbox-dispatcher-{n}"),
                    store.clone(),
                    publisher.clone(),
                    clock.clone(),
                    config.dispatcher(),
                )
                .start()
            })
            .collect();
        handles.push(ClaimSweeper::new(store, config.claim_timeout, config.sweep_interval).start());
        tracing::info!(dispatchers = config.workers, "outbox workers started");
        Self { handles }
    }

    pub fn names(&self) -> Vec<&str> {
        self.handles.iter().map(WorkerHandle::name).collect()
    }

    /// Stops every worker and waits for all of them. In-flight claims are released by the
    /// dispatchers before they return.
    pub async fn stop(self) {
        futures::future::join_all(self.handles.into_iter().map(WorkerHandle::stop)).await;
        tracing::info!("outbox workers stopped");
    }
}

#[cfg(test)]
mod outbox_workers_tests {
    use super::*;
    use crate::shared::core::clock::SystemClock;
    use crate::shared::infrastructure::event_bus::in_memory::InMemoryEventBus;
    use crate::shared::infrastructure::integration_event::IntegrationEvent;
    use crate::shared::infrastructure::outbox::translator::to_outbox_message;
    use crate::shared::infrastructure::persistence::in_memory::InMemoryDatabase;
    use chrono::Utc;
    use rstest::rstest;
    use serde_json::json;
    use std::time::Duration;
    use uuid::Uuid;

    #[rstest]
    #[tokio::test]
    async fn it_should_deliver_each_message_once_with_several_dispatchers() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let db = Arc::new(InMemoryDatabase::new());
        let bus = Arc::new(InMemoryEventBus::new());
        for n in 0..20 {
            let envelope = IntegrationEvent::new(
                "PaymentCreated",
                1,
                Uuid::now_v7(),
                Utc::now(),
                json!({ "n": n }),
            );
            db.add_message(to_outbox_message(&envelope, clock.as_ref(), 3).unwrap())
                .await
                .unwrap();
        }
        let config = OutboxConfig {
            batch_size: 4,
            poll_interval: Duration::from_millis(5),
            workers: 3,
            ..OutboxConfig::default()
        };

        let workers = OutboxWorkers::start(&config, db.clone(), bus.clone(), clock);
        assert_eq!(
            workers.names(),
            vec![
                "outbox-dispatcher-0",
                "outbox-dispatcher-1",
                "outbox-dispatcher-2",
                "outbox-claim-sweeper"
            ]
        );
        tokio::time::timeout(Duration::from_secs(2), async {
            while bus.published().await.len() < 20 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("workers did not drain the outbox");
        workers.stop().await;

        let mut ids: Vec<Uuid> = bus.published().await.iter().map(|p| p.event.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);
        assert!(db.outbox_rows().await.iter().all(|m| m.is_processed()));
    }
}
