//! Retry classification and backoff arithmetic.

use std::time::Duration;

/// Statuses worth retrying: rate limiting and transient server faults.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Bounded retry schedule used by the resilient client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed beyond the first attempt.
    pub max_retries: u32,
    /// Backoff base after a retryable status.
    pub status_base: Duration,
    /// Backoff base after a transport failure.
    pub transport_base: Duration,
    /// Ceiling for any single computed or server-hinted wait.
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            status_base: Duration::from_millis(700),
            transport_base: Duration::from_millis(500),
            cap: Duration::from_millis(7500),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry` (1-indexed) after a retryable status.
    ///
    /// A server hint (`Retry-After` seconds) replaces the computed backoff but
    /// is still held under the ceiling so shutdown latency stays bounded.
    pub fn status_wait(&self, retry: u32, retry_after_secs: Option<u64>) -> Duration {
        match retry_after_secs {
            Some(secs) => Duration::from_secs(secs).min(self.cap),
            None => exponential(self.status_base, retry, self.cap),
        }
    }

    /// Wait before retry number `retry` (1-indexed) after a transport failure.
    pub fn transport_wait(&self, retry: u32) -> Duration {
        exponential(self.transport_base, retry, self.cap)
    }
}

/// `min(cap, base * 2^(retry-1))`.
pub fn exponential(base: Duration, retry: u32, cap: Duration) -> Duration {
    let exponent = retry.saturating_sub(1).min(31);
    base.checked_mul(1u32 << exponent).unwrap_or(cap).min(cap)
}

/// Apply a jitter offset to `base`, clamped below by `floor`.
pub fn jittered(base: Duration, offset_secs: f64, floor: Duration) -> Duration {
    if offset_secs == 0.0 {
        return base.max(floor);
    }
    let secs = base.as_secs_f64() + offset_secs;
    if secs <= floor.as_secs_f64() {
        return floor;
    }
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn exponential_doubles_until_cap() {
        let base = Duration::from_millis(700);
        let cap = Duration::from_millis(7500);
        assert_eq!(exponential(base, 1, cap), Duration::from_millis(700));
        assert_eq!(exponential(base, 2, cap), Duration::from_millis(1400));
        assert_eq!(exponential(base, 4, cap), Duration::from_millis(5600));
        assert_eq!(exponential(base, 5, cap), cap);
        assert_eq!(exponential(base, 40, cap), cap);
    }

    #[test]
    fn retry_after_overrides_backoff_within_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.status_wait(1, Some(3)), Duration::from_secs(3));
        assert_eq!(policy.status_wait(1, Some(60)), policy.cap);
        assert_eq!(policy.status_wait(2, None), Duration::from_millis(1400));
        assert_eq!(policy.transport_wait(2), Duration::from_millis(1000));
    }

    #[test]
    fn jitter_is_clamped_to_floor() {
        let floor = Duration::from_millis(400);
        assert_eq!(jittered(Duration::from_millis(100), -0.05, floor), floor);
        assert_eq!(
            jittered(Duration::from_secs(1), 0.25, floor),
            Duration::from_millis(1250)
        );
    }
}
