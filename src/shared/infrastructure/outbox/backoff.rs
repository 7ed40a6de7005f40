// Retry schedule for failed publish attempts.
//
// delay(k) = min(2^(k-1) s, 300 s) + jitter, jitter uniform in [0, 1000) ms,
// where k is the attempt count after recording the failure (k >= 1).

use chrono::Duration;
use rand::Rng;

pub const MAX_BACKOFF_SECS: i64 = 300;
pub const MAX_JITTER_MS: i64 = 1_000;

/// Deterministic part of the delay for the k-th failed attempt.
pub fn base_delay(attempt_count: u32) -> Duration {
    let exponent = attempt_count.saturating_sub(1);
    let secs = 1i64
        .checked_shl(exponent)
        .filter(|secs| *secs > 0 && *secs <= MAX_BACKOFF_SECS)
        .unwrap_or(MAX_BACKOFF_SECS);
    Duration::seconds(secs)
}

pub fn random_jitter() -> Duration {
    Duration::milliseconds(rand::thread_rng().gen_range(0..MAX_JITTER_MS))
}

/// Full delay for the k-th failed attempt with an explicit jitter. Jitter outside
/// [0, 1000) ms is clamped into range.
pub fn retry_delay(attempt_count: u32, jitter: Duration) -> Duration {
    let jitter_ms = jitter.num_milliseconds().clamp(0, MAX_JITTER_MS - 1);
    base_delay(attempt_count) + Duration::milliseconds(jitter_ms)
}
