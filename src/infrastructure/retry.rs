//! Retry policy with exponential backoff.
//!
//! Used on the two bounded-retry paths in the engine: broker publish and
//! notification delivery. Backoff doubles per attempt and is capped;
//! exhaustion returns the last error to the caller, which decides whether
//! to surface it (publish) or mark the work item failed (delivery).

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::EngineError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    max_attempts: u32,
    /// Initial backoff duration in milliseconds.
    initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds.
    max_backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `operation` until it succeeds or `max_attempts` is exhausted.
    /// Returns the number of attempts used alongside the result so callers
    /// can persist it (reminder `attempt_count`) or report it
    /// (`PublishFailed`).
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> (u32, Result<T, EngineError>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("operation succeeded on attempt {}", attempt);
                    }
                    return (attempt, Ok(result));
                }
                Err(err) => {
                    if attempt >= self.max_attempts {
                        warn!("operation failed after {} attempts: {}", attempt, err);
                        return (attempt, Err(err));
                    }
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        "attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, self.max_attempts, err, backoff
                    );
                    sleep(backoff).await;
                }
            }
        }
    }

    /// Backoff before the attempt following `completed_attempts`:
    /// min(initial * 2^(n-1), max).
    fn backoff_for(&self, completed_attempts: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(completed_attempts.saturating_sub(1)))
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 500, 10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 1000, 4000);
        assert_eq!(policy.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_succeeds_without_retry() {
        let policy = RetryPolicy::new(3, 10, 100);
        let calls = Arc::new(AtomicU32::new(0));

        let (attempts, result) = policy
            .execute(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, EngineError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let policy = RetryPolicy::new(3, 10, 100);
        let calls = Arc::new(AtomicU32::new(0));

        let (attempts, result) = policy
            .execute(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(EngineError::Broker("unavailable".to_string()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let policy = RetryPolicy::new(2, 10, 100);
        let calls = Arc::new(AtomicU32::new(0));

        let (attempts, result) = policy
            .execute(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(EngineError::Broker("still down".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
