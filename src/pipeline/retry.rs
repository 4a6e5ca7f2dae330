use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Attempts per upload before the failure is fatal
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt (doubles each attempt)
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// How often, and how patiently, a failing task is re-run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Retry without waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Attempts actually made; at least one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `task` until it succeeds or `policy` runs out of attempts.
///
/// `task` is called once per attempt and must produce a fresh future each
/// time. The error of the last attempt is returned.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, label: &str, mut task: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match task().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "{}: attempt {}/{} failed, retrying in {:.1?}: {}",
                    label, attempt, attempts, delay, e
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<&str, String> = retry(&RetryPolicy::immediate(3), "flaky", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 { Err(format!("attempt {n}")) } else { Ok("done") }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fails_after_third_attempt() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), String> = retry(&RetryPolicy::immediate(3), "broken", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err(format!("attempt {n}"))
        })
        .await;

        assert_eq!(result, Err("attempt 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_success_is_not_repeated() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<u32, String> = retry(&RetryPolicy::default(), "ok", move || async move {
            Ok(calls.fetch_add(1, Ordering::SeqCst))
        })
        .await;

        assert_eq!(result, Ok(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let _: Result<(), &str> = retry(&RetryPolicy::immediate(0), "zero", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("nope")
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exponential_delay() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(RetryPolicy::immediate(3).delay_after(2), Duration::ZERO);
    }
}
