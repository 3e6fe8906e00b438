//! Retry with Exponential Backoff
//!
//! Rate-limit responses are retried with escalating delays:
//!   base, base × factor, base × factor², ... plus up to `max_jitter` of noise.
//! Any other upstream failure is returned immediately.
//!
//! Author: AI-Generated
//! Created: 2026-10-18

use crate::error::{ScanError, ScanResult, UpstreamError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default attempts per call, including the first one
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per call (first try plus retries)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: u32,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2,
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after failed attempt number `attempt` (1-based), without jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self
            .backoff_factor
            .saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(multiplier)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error,
    /// or exhausts `max_attempts` rate-limit responses.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> ScanResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(UpstreamError::RateLimited) => {
                    if attempt >= max_attempts {
                        warn!("{} still rate limited after {} attempts, giving up", label, attempt);
                        return Err(ScanError::UpstreamRateLimited { attempts: attempt });
                    }
                    let delay = self.delay_for(attempt) + self.jitter();
                    warn!(
                        "{} rate limited (attempt {}/{}), retrying in {:?}",
                        label, attempt, max_attempts, delay
                    );
                    sleep(delay).await;
                }
                Err(UpstreamError::Unavailable(msg)) => {
                    return Err(ScanError::UpstreamUnavailable(msg));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2,
            max_jitter: Duration::ZERO,
        }
    }

    #[test]
    fn test_delay_escalation() {
        let p = policy();
        assert_eq!(p.delay_for(1), Duration::from_secs(1));
        assert_eq!(p.delay_for(2), Duration::from_secs(2));
        assert_eq!(p.delay_for(3), Duration::from_secs(4));
        // No overflow panic on absurd attempt counts
        assert!(p.delay_for(200) >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_rate_limits() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let start = Instant::now();

        let value = assert_ok!(
            policy()
                .run("search", move || async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(UpstreamError::RateLimited)
                    } else {
                        Ok(n)
                    }
                })
                .await
        );

        assert_eq!(value, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff
        assert_eq!(Instant::now() - start, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_at_ceiling() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let err = assert_err!(
            policy()
                .run("search", move || async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(UpstreamError::RateLimited)
                })
                .await
        );

        assert_eq!(err, ScanError::UpstreamRateLimited { attempts: 3 });
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_not_retried() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let err = assert_err!(
            policy()
                .run("search", move || async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(UpstreamError::Unavailable("502 Bad Gateway".to_string()))
                })
                .await
        );

        assert_eq!(err, ScanError::UpstreamUnavailable("502 Bad Gateway".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_jitter_is_small() {
        let p = RetryPolicy::default();
        assert!(p.max_jitter < p.base_delay / 2);
        assert_eq!(p.max_jitter, Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_bounded() {
        let p = RetryPolicy {
            max_jitter: Duration::from_millis(250),
            ..policy()
        };
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let start = Instant::now();

        let _ = p
            .run("search", move || async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 {
                    Err(UpstreamError::RateLimited)
                } else {
                    Ok(())
                }
            })
            .await;

        let elapsed = Instant::now() - start;
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed <= Duration::from_millis(1250));
    }
}
