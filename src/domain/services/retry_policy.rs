//! Exponential backoff shared by every outbound call

use std::fmt::Display;
use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::utils::logging;

const BACKOFF_BASE: f64 = 1.5;
const MIN_MAX_WAIT: Duration = Duration::from_secs(2);

/// Backoff for the given 0-based attempt.
///
/// Returns `1.5^attempt` seconds, capped at `max_wait`. The second value is
/// true when the cap was applied. `max_wait` below 2s is raised to 2s.
pub fn backoff(attempt: u32, max_wait: Duration) -> (Duration, bool) {
    let max_wait = max_wait.max(MIN_MAX_WAIT);
    let secs = BACKOFF_BASE.powi(attempt.min(i32::MAX as u32) as i32);

    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if duration <= max_wait => (duration, false),
        _ => (max_wait, true),
    }
}

/// Retry settings for network calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, negative for unlimited. 0 and 1 both mean a single attempt.
    max_attempts: i64,
    max_wait: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: i64, max_wait: Duration) -> Self {
        Self {
            max_attempts,
            max_wait: max_wait.max(MIN_MAX_WAIT),
        }
    }

    pub fn from_secs(max_attempts: i64, max_wait_secs: u64) -> Self {
        Self::new(max_attempts, Duration::from_secs(max_wait_secs))
    }

    pub fn max_attempts(&self) -> i64 {
        self.max_attempts
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    fn exhausted(&self, failures: u64) -> bool {
        self.max_attempts >= 0 && failures >= self.max_attempts.max(1) as u64
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    ///
    /// Sleeps `backoff(n)` after the n-th failure (0-based) unless it was the
    /// last allowed attempt, and returns the last error.
    pub async fn with_retry<F, Fut, T, E>(&self, operation_name: &str, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut failures: u64 = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if failures > 0 {
                        logging::log_info(&format!(
                            "{} succeeded after {} retries",
                            operation_name, failures
                        ));
                    }
                    return Ok(result);
                }
                Err(e) => {
                    let attempt = failures;
                    failures += 1;

                    if self.exhausted(failures) {
                        logging::log_error(&format!(
                            "{} failed after {} attempts: {}",
                            operation_name, failures, e
                        ));
                        return Err(e);
                    }

                    let (delay, capped) =
                        backoff(attempt.min(u32::MAX as u64) as u32, self.max_wait);
                    logging::log_warning(&format!(
                        "{} failed (attempt {}{}): {}. Retrying in {:?}{}",
                        operation_name,
                        failures,
                        if self.max_attempts < 0 {
                            String::new()
                        } else {
                            format!("/{}", self.max_attempts)
                        },
                        e,
                        delay,
                        if capped { " (max wait)" } else { "" }
                    ));

                    sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_first_attempt_is_one_second() {
        assert_eq!(backoff(0, Duration::from_secs(30)), (Duration::from_secs(1), false));
        assert_eq!(
            backoff(1, Duration::from_secs(30)),
            (Duration::from_millis(1500), false)
        );
    }

    #[test]
    fn test_backoff_is_monotonic_and_capped() {
        let max_wait = Duration::from_secs(20);
        let mut previous = Duration::ZERO;
        for attempt in 0..200 {
            let (delay, _) = backoff(attempt, max_wait);
            assert!(delay >= previous, "attempt {} went down", attempt);
            assert!(delay <= max_wait);
            previous = delay;
        }
        assert_eq!(backoff(10_000, max_wait), (max_wait, true));
        assert_eq!(backoff(u32::MAX, max_wait), (max_wait, true));
    }

    #[test]
    fn test_max_wait_floor() {
        let (delay, capped) = backoff(5, Duration::from_millis(100));
        assert_eq!(delay, Duration::from_secs(2));
        assert!(capped);
        assert_eq!(RetryPolicy::from_secs(3, 0).max_wait(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_returns_last_error_after_max_attempts() {
        let policy = RetryPolicy::from_secs(3, 30);
        let calls = Arc::new(AtomicUsize::new(0));
        let started = tokio::time::Instant::now();

        let result: Result<(), String> = policy
            .with_retry("always failing", || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(format!("failure {}", n))
                }
            })
            .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two sleeps: backoff(0) + backoff(1)
        assert_eq!(started.elapsed(), Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_recovers() {
        let policy = RetryPolicy::from_secs(5, 30);
        let calls = Arc::new(AtomicUsize::new(0));

        let result: Result<usize, String> = policy
            .with_retry("flaky", || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err("not yet".to_string())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_does_not_sleep() {
        for max_attempts in [0, 1] {
            let policy = RetryPolicy::from_secs(max_attempts, 30);
            let started = tokio::time::Instant::now();
            let result: Result<(), &str> = policy.with_retry("once", || async { Err("boom") }).await;
            assert_eq!(result, Err("boom"));
            assert_eq!(started.elapsed(), Duration::ZERO);
        }
    }
}
