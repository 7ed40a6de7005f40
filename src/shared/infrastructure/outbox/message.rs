// One row of the outbox table and its lifecycle.
//
// pending -> claimed -> completed
//                    -> failed attempt -> (claimed again once due) ... -> permanently failed
//
// Invariants
// - processed_on_utc set means terminal: never claimed, retried or overwritten again.
// - attempt_count <= max_attempts.
// - next_attempt_on_utc is only set while attempt_count < max_attempts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::infrastructure::outbox::backoff::retry_delay;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub event_type: String,
    pub content: String,
    pub occurred_on_utc: DateTime<Utc>,
    pub processed_on_utc: Option<DateTime<Utc>>,
    pub claimed_on_utc: Option<DateTime<Utc>>,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub next_attempt_on_utc: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
}

/// What recording a failed publish did to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedAttempt {
    Rescheduled { next_attempt_on_utc: DateTime<Utc> },
    DeadLettered,
    /// The row was already terminal; nothing changed.
    Ignored,
}

impl OutboxMessage {
    pub fn new(
        event_type: impl Into<String>,
        content: impl Into<String>,
        occurred_on_utc: DateTime<Utc>,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            content: content.into(),
            occurred_on_utc,
            processed_on_utc: None,
            claimed_on_utc: None,
            attempt_count: 0,
            max_attempts: max_attempts.max(1),
            next_attempt_on_utc: None,
            last_error_message: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed_on_utc.is_some()
    }

    pub fn is_permanently_failed(&self) -> bool {
        !self.is_processed() && self.attempt_count >= self.max_attempts
    }

    /// True while a worker holds a lease that has not yet expired.
    pub fn has_active_claim(&self, now: DateTime<Utc>, claim_timeout: Duration) -> bool {
        self.claimed_on_utc
            .is_some_and(|claimed| claimed + claim_timeout > now)
    }

    pub fn is_claimable(&self, now: DateTime<Utc>, claim_timeout: Duration) -> bool {
        !self.is_processed() && !self.has_active_claim(now, claim_timeout)
    }

    /// Retry budget left and backoff window elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.attempt_count < self.max_attempts
            && self.next_attempt_on_utc.is_none_or(|next| next <= now)
    }

    /// Sort key used to hand out retries earliest-due first.
    pub fn due_on_utc(&self) -> DateTime<Utc> {
        self.next_attempt_on_utc.unwrap_or(self.occurred_on_utc)
    }

    pub fn claim(&mut self, now: DateTime<Utc>) {
        self.claimed_on_utc = Some(now);
    }

    pub fn release_claim(&mut self) {
        self.claimed_on_utc = None;
    }

    pub fn mark_processed(&mut self, now: DateTime<Utc>) {
        self.processed_on_utc = Some(now);
        self.claimed_on_utc = None;
        self.next_attempt_on_utc = None;
        self.last_error_message = None;
    }

    pub fn record_failed_attempt(
        &mut self,
        error: &str,
        now: DateTime<Utc>,
        jitter: Duration,
    ) -> FailedAttempt {
        if self.is_processed() || self.is_permanently_failed() {
            return FailedAttempt::Ignored;
        }
        self.attempt_count += 1;
        self.claimed_on_utc = None;

        if self.attempt_count >= self.max_attempts {
            self.next_attempt_on_utc = None;
            self.last_error_message = Some(format!(
                "permanently failed after {} attempts: {error}",
                self.attempt_count
            ));
            return FailedAttempt::DeadLettered;
        }

        let next_attempt_on_utc = now + retry_delay(self.attempt_count, jitter);
        self.next_attempt_on_utc = Some(next_attempt_on_utc);
        self.last_error_message = Some(error.to_string());
        FailedAttempt::Rescheduled {
            next_attempt_on_utc,
        }
    }

    /// Exhausts the retry budget at once, for failures a retry cannot repair.
    pub fn mark_permanently_failed(&mut self, reason: &str) {
        if self.is_processed() {
            return;
        }
        self.attempt_count = self.max_attempts;
        self.claimed_on_utc = None;
        self.next_attempt_on_utc = None;
        self.last_error_message = Some(format!("permanently failed: {reason}"));
    }

    /// Operator action: give a dead-lettered row a fresh retry budget.
    pub fn requeue(&mut self) {
        if self.is_processed() {
            return;
        }
        self.attempt_count = 0;
        self.claimed_on_utc = None;
        self.next_attempt_on_utc = None;
    }
}

#[cfg(test)]
mod outbox_message_tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[fixture]
    fn message(now: DateTime<Utc>) -> OutboxMessage {
        OutboxMessage::new("PaymentCompleted", "{}", now, 3)
    }

    #[rstest]
    fn it_should_start_pending(message: OutboxMessage) {
        assert!(!message.is_processed());
        assert!(!message.is_permanently_failed());
        assert_eq!(message.attempt_count, 0);
        assert_eq!(message.claimed_on_utc, None);
        assert_eq!(message.next_attempt_on_utc, None);
        assert_eq!(message.last_error_message, None);
    }

    #[rstest]
    fn it_should_never_allow_a_zero_retry_budget(now: DateTime<Utc>) {
        let message = OutboxMessage::new("PaymentCompleted", "{}", now, 0);
        assert_eq!(message.max_attempts, 1);
    }

    #[rstest]
    fn it_should_treat_a_claim_as_a_lease(mut message: OutboxMessage, now: DateTime<Utc>) {
        let timeout = Duration::minutes(5);
        message.claim(now);
        assert!(!message.is_claimable(now + Duration::minutes(4), timeout));
        assert!(message.is_claimable(now + Duration::minutes(5), timeout));
        assert!(message.is_claimable(now + Duration::minutes(6), timeout));
    }

    #[rstest]
    fn it_should_clear_claim_and_error_when_processed(
        mut message: OutboxMessage,
        now: DateTime<Utc>,
    ) {
        message.claim(now);
        message.record_failed_attempt("broker down", now, Duration::zero());
        message.claim(now + Duration::seconds(2));
        message.mark_processed(now + Duration::seconds(3));

        assert_eq!(message.processed_on_utc, Some(now + Duration::seconds(3)));
        assert_eq!(message.claimed_on_utc, None);
        assert_eq!(message.last_error_message, None);
        assert!(!message.is_claimable(now + Duration::hours(1), Duration::minutes(5)));
    }

    #[rstest]
    fn it_should_schedule_a_retry_with_backoff(mut message: OutboxMessage, now: DateTime<Utc>) {
        message.claim(now);
        let first = message.record_failed_attempt("timeout", now, Duration::milliseconds(10));
        assert_eq!(
            first,
            FailedAttempt::Rescheduled {
                next_attempt_on_utc: now + Duration::milliseconds(1_010)
            }
        );
        assert_eq!(message.attempt_count, 1);
        assert_eq!(message.claimed_on_utc, None);
        assert_eq!(message.last_error_message.as_deref(), Some("timeout"));
        assert!(!message.is_due(now));
        assert!(message.is_due(now + Duration::seconds(2)));

        let second = message.record_failed_attempt("timeout", now, Duration::zero());
        assert_eq!(
            second,
            FailedAttempt::Rescheduled {
                next_attempt_on_utc: now + Duration::seconds(2)
            }
        );
    }

    #[rstest]
    fn it_should_dead_letter_when_the_budget_is_spent(
        mut message: OutboxMessage,
        now: DateTime<Utc>,
    ) {
        message.record_failed_attempt("e1", now, Duration::zero());
        message.record_failed_attempt("e2", now, Duration::zero());
        let last = message.record_failed_attempt("e3", now, Duration::zero());

        assert_eq!(last, FailedAttempt::DeadLettered);
        assert_eq!(message.attempt_count, 3);
        assert_eq!(message.next_attempt_on_utc, None);
        assert!(message.is_permanently_failed());
        assert!(!message.is_due(now + Duration::days(1)));
        assert_eq!(
            message.last_error_message.as_deref(),
            Some("permanently failed after 3 attempts: e3")
        );

        assert_eq!(
            message.record_failed_attempt("e4", now, Duration::zero()),
            FailedAttempt::Ignored
        );
        assert_eq!(message.attempt_count, 3);
    }

    #[rstest]
    fn it_should_ignore_failures_after_processing(mut message: OutboxMessage, now: DateTime<Utc>) {
        message.mark_processed(now);
        assert_eq!(
            message.record_failed_attempt("late", now, Duration::zero()),
            FailedAttempt::Ignored
        );
        message.mark_permanently_failed("late");
        assert_eq!(message.attempt_count, 0);
        assert_eq!(message.last_error_message, None);
    }

    #[rstest]
    fn it_should_dead_letter_immediately_on_demand(mut message: OutboxMessage, now: DateTime<Utc>) {
        message.claim(now);
        message.mark_permanently_failed("undecodable content");
        assert!(message.is_permanently_failed());
        assert_eq!(message.attempt_count, message.max_attempts);
        assert_eq!(message.claimed_on_utc, None);
    }

    #[rstest]
    fn it_should_requeue_a_dead_letter(mut message: OutboxMessage, now: DateTime<Utc>) {
        message.mark_permanently_failed("bad");
        message.requeue();
        assert!(!message.is_permanently_failed());
        assert!(message.is_due(now));
        assert_eq!(message.attempt_count, 0);
    }

    #[rstest]
    fn it_should_sort_retries_by_due_time(mut message: OutboxMessage, now: DateTime<Utc>) {
        assert_eq!(message.due_on_utc(), now);
        message.record_failed_attempt("e", now, Duration::zero());
        assert_eq!(message.due_on_utc(), now + Duration::seconds(1));
    }
}
