//! Quote Gateway
//!
//! Single entry point for upstream pair data. Every call passes through the
//! shared rate limiter, is retried with backoff on rate-limit responses, and
//! comes back as normalized `TradingPair`s. The gateway never touches the
//! contract cache; callers decide what to record.
//!
//! Author: AI-Generated
//! Created: 2026-10-18

pub mod normalize;
pub mod provider;
pub mod rate_limiter;
pub mod retry;

pub use normalize::{normalize_record, normalize_records};
pub use provider::{DexScreenerClient, QuoteProvider, DEFAULT_BASE_URL};
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;

use crate::error::ScanResult;
use crate::types::TradingPair;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Upstream request kinds
#[derive(Debug, Clone, Copy)]
enum Call<'a> {
    Search(&'a str),
    TokenPairs(&'a str),
}

impl fmt::Display for Call<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Call::Search(q) => write!(f, "search '{}'", q),
            Call::TokenPairs(t) => write!(f, "token pairs {}", t),
        }
    }
}

#[derive(Debug, Default)]
struct GatewayCounters {
    calls: AtomicU64,
    attempts: AtomicU64,
    pairs: AtomicU64,
}

/// Point-in-time gateway counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    /// Logical calls made by callers
    pub calls: u64,
    /// Outbound requests, retries included
    pub attempts: u64,
    /// Pairs returned after normalization
    pub pairs: u64,
}

pub struct QuoteGateway {
    provider: Arc<dyn QuoteProvider>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    counters: GatewayCounters,
}

impl QuoteGateway {
    pub fn new(provider: Arc<dyn QuoteProvider>, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            limiter,
            retry,
            counters: GatewayCounters::default(),
        }
    }

    /// Search by free text or pair address
    pub async fn resolve(&self, query: &str) -> ScanResult<Vec<TradingPair>> {
        self.call(Call::Search(query)).await
    }

    /// Resolve several pair addresses in one call (comma-joined query)
    pub async fn resolve_batch(&self, addresses: &[String]) -> ScanResult<Vec<TradingPair>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let query = addresses.join(", ");
        self.call(Call::Search(&query)).await
    }

    /// Every market trading `token_address`
    pub async fn pairs_for_token(&self, token_address: &str) -> ScanResult<Vec<TradingPair>> {
        self.call(Call::TokenPairs(token_address)).await
    }

    /// Best-liquidity eligible pair for a query, if any
    pub async fn spot_quote(&self, query: &str) -> ScanResult<Option<TradingPair>> {
        let pairs = self.resolve(query).await?;
        Ok(pairs
            .into_iter()
            .filter(|p| p.is_eligible())
            .fold(None, |best: Option<TradingPair>, p| match best {
                Some(b) if b.liquidity_usd >= p.liquidity_usd => Some(b),
                _ => Some(p),
            }))
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            calls: self.counters.calls.load(Ordering::Relaxed),
            attempts: self.counters.attempts.load(Ordering::Relaxed),
            pairs: self.counters.pairs.load(Ordering::Relaxed),
        }
    }

    async fn call(&self, call: Call<'_>) -> ScanResult<Vec<TradingPair>> {
        self.counters.calls.fetch_add(1, Ordering::Relaxed);

        let provider = &self.provider;
        let limiter = &self.limiter;
        let attempts = &self.counters.attempts;
        let label = call.to_string();

        let records = self
            .retry
            .run(&label, move || async move {
                limiter.acquire().await;
                attempts.fetch_add(1, Ordering::Relaxed);
                match call {
                    Call::Search(query) => provider.search_pairs(query).await,
                    Call::TokenPairs(token) => provider.token_pairs(token).await,
                }
            })
            .await?;

        let pairs = normalize_records(&records);
        self.counters.pairs.fetch_add(pairs.len() as u64, Ordering::Relaxed);
        debug!("{} -> {} pairs", label, pairs.len());
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::provider::scripted::ScriptedProvider;
    use super::*;
    use crate::error::{ScanError, UpstreamError};
    use crate::types::fixtures::pair;
    use futures::future::join_all;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn gateway(provider: Arc<ScriptedProvider>, max_calls: u32) -> QuoteGateway {
        let retry = RetryPolicy {
            max_jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        QuoteGateway::new(provider, Arc::new(RateLimiter::new(max_calls, Duration::from_secs(1))), retry)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_twice_then_succeeds() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.on_search("0xpool", &[pair("0xpool", "0xa", "0xb", 1.0, 20_000.0)]);
        provider.fail_next(2, UpstreamError::RateLimited);

        let gw = gateway(Arc::clone(&provider), 60);
        let pairs = assert_ok!(gw.resolve("0xpool").await);

        assert_eq!(pairs.len(), 1);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(gw.stats(), GatewayStats { calls: 1, attempts: 3, pairs: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.fail_next(5, UpstreamError::RateLimited);

        let gw = gateway(Arc::clone(&provider), 60);
        let err = assert_err!(gw.resolve("0xpool").await);

        assert_eq!(err, ScanError::UpstreamRateLimited { attempts: 3 });
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_respect_window() {
        let provider = Arc::new(ScriptedProvider::new());
        let gw = gateway(Arc::clone(&provider), 3);

        let queries: Vec<String> = (0..10).map(|i| format!("0xpool{}", i)).collect();
        let results = join_all(queries.iter().map(|q| gw.resolve(q))).await;
        assert!(results.iter().all(|r| r.is_ok()));

        let times: Vec<_> = provider.calls().into_iter().map(|(_, t)| t).collect();
        assert_eq!(times.len(), 10);
        for &start in &times {
            let in_window = times
                .iter()
                .filter(|&&t| t >= start && t < start + Duration::from_secs(1))
                .count();
            assert!(in_window <= 3, "{} calls inside one window", in_window);
        }
    }

    #[tokio::test]
    async fn test_resolve_batch_joins_addresses() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.on_search(
            "0xp1, 0xp2",
            &[pair("0xp1", "0xa", "0xb", 1.0, 20_000.0), pair("0xp2", "0xb", "0xc", 2.0, 20_000.0)],
        );
        let gw = gateway(Arc::clone(&provider), 60);

        let pairs = assert_ok!(gw.resolve_batch(&["0xp1".to_string(), "0xp2".to_string()]).await);
        assert_eq!(pairs.len(), 2);

        let empty = assert_ok!(gw.resolve_batch(&[]).await);
        assert!(empty.is_empty());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_spot_quote_prefers_deepest_pool() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.on_search(
            "WETH",
            &[
                pair("0xshallow", "0xweth", "0xusdc", 3000.0, 50_000.0),
                pair("0xdeep", "0xweth", "0xusdc", 3001.0, 5_000_000.0),
                pair("0xbroken", "0xweth", "0xusdc", 0.0, 9_000_000.0),
            ],
        );
        let gw = gateway(provider, 60);

        let quote = assert_ok!(gw.spot_quote("WETH").await);
        assert_eq!(quote.map(|p| p.pair_address), Some("0xdeep".to_string()));
    }
}
