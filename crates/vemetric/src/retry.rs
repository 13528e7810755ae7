//! Condition-gated retry.
//!
//! [`retry`] waits for a precondition rather than repeating an operation:
//! it re-checks `should_retry` every `interval` until it turns false, then
//! runs the action exactly once. If the budget runs out while the
//! condition still holds, the action never runs and `None` is returned.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Interval and budget for a condition-gated wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between two checks of the condition.
    pub interval: Duration,
    /// Re-checks allowed after the first one.
    pub max_retries: u32,
}

/// Wait until `should_retry` returns false, then run `action` once.
///
/// The condition is checked immediately, then once per `interval`, for at
/// most `max_retries + 1` checks in total.
pub async fn retry<P, F, Fut>(
    policy: RetryPolicy,
    mut should_retry: P,
    action: F,
) -> Option<Fut::Output>
where
    P: FnMut() -> bool,
    F: FnOnce() -> Fut,
    Fut: Future,
{
    let mut attempt = 0;
    while should_retry() {
        if attempt >= policy.max_retries {
            debug!(attempts = attempt, "retry budget exhausted, giving up");
            return None;
        }
        attempt += 1;
        tokio::time::sleep(policy.interval).await;
    }

    Some(action().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(100),
            max_retries,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_when_condition_clear() {
        let started = tokio::time::Instant::now();
        let result = retry(policy(3), || false, || async { 42 }).await;

        assert_eq!(result, Some(42));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_condition_clears() {
        let checks = Cell::new(0);
        let started = tokio::time::Instant::now();

        let result = retry(
            policy(5),
            || {
                checks.set(checks.get() + 1);
                checks.get() <= 2
            },
            || async { "sent" },
        )
        .await;

        assert_eq!(result, Some("sent"));
        assert_eq!(checks.get(), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_never_runs_action() {
        let checks = Cell::new(0);
        let ran = Cell::new(false);

        let result = retry(
            policy(3),
            || {
                checks.set(checks.get() + 1);
                true
            },
            || async { ran.set(true) },
        )
        .await;

        assert!(result.is_none());
        assert!(!ran.get());
        assert_eq!(checks.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_checks_once() {
        let checks = Cell::new(0);
        let result = retry(
            policy(0),
            || {
                checks.set(checks.get() + 1);
                true
            },
            || async {},
        )
        .await;

        assert!(result.is_none());
        assert_eq!(checks.get(), 1);
    }
}
