//! Upstream Rate Limiter
//!
//! Sliding-window limiter shared by every outbound quote call:
//! at most `max_calls` calls start within any `interval`, and consecutive
//! calls are at least `min_delay` apart.
//!
//! Callers queue on the history lock while they wait, so concurrent
//! callers are served one after another instead of bursting.
//!
//! Author: AI-Generated
//! Created: 2026-10-18

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Global limiter for one upstream provider
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    interval: Duration,
    min_delay: Duration,
    /// Start times of calls still inside the window
    history: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// `max_calls` per `interval`; a zero budget is treated as one call.
    pub fn new(max_calls: u32, interval: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1) as usize,
            interval,
            min_delay: Duration::ZERO,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Minimum spacing between two consecutive calls
    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until a call may start, then record it.
    pub async fn acquire(&self) {
        let mut history = self.history.lock().await;

        loop {
            let now = Instant::now();
            while let Some(&oldest) = history.front() {
                if now.duration_since(oldest) >= self.interval {
                    history.pop_front();
                } else {
                    break;
                }
            }

            let spacing_wait = history
                .back()
                .map(|&last| (last + self.min_delay).saturating_duration_since(now))
                .unwrap_or(Duration::ZERO);

            let window_wait = if history.len() >= self.max_calls {
                history
                    .front()
                    .map(|&oldest| (oldest + self.interval).saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO)
            } else {
                Duration::ZERO
            };

            let wait = spacing_wait.max(window_wait);
            if wait.is_zero() {
                history.push_back(now);
                return;
            }

            debug!(
                "Rate limiter: {} calls in window (max {}), waiting {:?}",
                history.len(),
                self.max_calls,
                wait
            );
            sleep(wait).await;
        }
    }
}
