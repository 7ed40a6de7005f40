// In memory implementation of the EventPublisher port.
//
// Purpose
// - Support dispatcher tests and local development without a broker.
//
// Responsibilities
// - Record every accepted delivery for inspection.
// - Fail on demand: next N publishes, a whole event type, or everything while offline.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::shared::infrastructure::event_bus::{EventPublisher, PublishError};
use crate::shared::infrastructure::integration_event::IntegrationEvent;

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub event_type: String,
    pub event: IntegrationEvent,
}

#[derive(Default)]
pub struct InMemoryEventBus {
    published: Mutex<Vec<PublishedEvent>>,
    rejected_event_types: Mutex<HashSet<String>>,
    failures_left: AtomicU32,
    offline: AtomicBool,
    delay_ms: AtomicU64,
    attempts: AtomicUsize,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` publishes fail as unavailable.
    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub async fn reject_event_type(&self, event_type: impl Into<String>) {
        self.rejected_event_types
            .lock()
            .await
            .insert(event_type.into());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_delay_ms(&self, delay_ms: u64) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    /// Publish calls received, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn published(&self) -> Vec<PublishedEvent> {
        self.published.lock().await.clone()
    }

    fn take_scripted_failure(&self) -> bool {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(
        &self,
        event_type: &str,
        event: &IntegrationEvent,
    ) -> Result<(), PublishError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(PublishError::Unavailable("Event bus offline".into()));
        }
        if self.rejected_event_types.lock().await.contains(event_type) {
            return Err(PublishError::Rejected {
                event_type: event_type.to_string(),
                reason: "event type not accepted".into(),
            });
        }
        if self.take_scripted_failure() {
            return Err(PublishError::Unavailable("scripted failure".into()));
        }
        self.published.lock().await.push(PublishedEvent {
            event_type: event_type.to_string(),
            event: event.clone(),
        });
        Ok(())
    }
}
