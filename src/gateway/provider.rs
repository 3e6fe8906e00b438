//! Quote Providers
//!
//! `QuoteProvider` is the seam between the gateway and a pair-search API.
//! Providers return raw JSON records; normalization happens in the gateway
//! so every provider gets the same defaulting rules.
//!
//! `DexScreenerClient` speaks the public DexScreener HTTP API:
//!   GET {base}/latest/dex/search?q={query}
//!   GET {base}/latest/dex/tokens/{tokenAddress}
//!
//! Author: AI-Generated
//! Created: 2026-10-18

use crate::error::UpstreamError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.dexscreener.com";

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Free-text or address search
    async fn search_pairs(&self, query: &str) -> Result<Vec<Value>, UpstreamError>;

    /// Every market that trades `token_address`
    async fn token_pairs(&self, token_address: &str) -> Result<Vec<Value>, UpstreamError>;
}

/// `{"schemaVersion": "...", "pairs": [...] | null}`
#[derive(Debug, Deserialize)]
struct PairsResponse {
    #[serde(default)]
    pairs: Option<Vec<Value>>,
}

pub struct DexScreenerClient {
    client: reqwest::Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Unavailable(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, request: reqwest::RequestBuilder, label: &str) -> Result<Vec<Value>, UpstreamError> {
        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("{}: {}", label, e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimited);
        }
        if !status.is_success() {
            return Err(UpstreamError::Unavailable(format!("{}: HTTP {}", label, status)));
        }

        let body: PairsResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("{}: bad body: {}", label, e)))?;

        let pairs = body.pairs.unwrap_or_default();
        debug!("{} returned {} records", label, pairs.len());
        Ok(pairs)
    }
}

#[async_trait]
impl QuoteProvider for DexScreenerClient {
    async fn search_pairs(&self, query: &str) -> Result<Vec<Value>, UpstreamError> {
        let url = format!("{}/latest/dex/search", self.base_url);
        let request = self.client.get(url).query(&[("q", query)]);
        self.fetch(request, &format!("search '{}'", query)).await
    }

    async fn token_pairs(&self, token_address: &str) -> Result<Vec<Value>, UpstreamError> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, token_address);
        self.fetch(self.client.get(url), &format!("token pairs {}", token_address))
            .await
    }
}

/// In-process provider with canned responses, for tests
#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use crate::types::TradingPair;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// DexScreener-shaped record for a pair; prices are strings as upstream sends them
    pub fn pair_record(pair: &TradingPair) -> Value {
        json!({
            "chainId": pair.chain_id,
            "dexId": pair.dex_id,
            "url": pair.url,
            "pairAddress": pair.pair_address,
            "baseToken": { "address": pair.base_token_address, "name": pair.base_token_name, "symbol": pair.base_token_name },
            "quoteToken": { "address": pair.quote_token_address, "name": pair.quote_token_name, "symbol": pair.quote_token_name },
            "priceNative": pair.price_native.to_string(),
            "priceUsd": pair.price_usd.to_string(),
            "liquidity": { "usd": pair.liquidity_usd, "base": pair.liquidity_base, "quote": pair.liquidity_quote },
        })
    }

    #[derive(Default)]
    pub struct ScriptedProvider {
        searches: Mutex<HashMap<String, Vec<Value>>>,
        tokens: Mutex<HashMap<String, Vec<Value>>>,
        failures: Mutex<VecDeque<UpstreamError>>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer `query` with these pairs (replaces any earlier answer)
        pub fn on_search(&self, query: &str, pairs: &[TradingPair]) {
            let records = pairs.iter().map(pair_record).collect();
            self.on_search_raw(query, records);
        }

        pub fn on_search_raw(&self, query: &str, records: Vec<Value>) {
            self.searches.lock().unwrap().insert(query.to_string(), records);
        }

        pub fn on_token(&self, token: &str, pairs: &[TradingPair]) {
            let records = pairs.iter().map(pair_record).collect();
            self.tokens.lock().unwrap().insert(token.to_string(), records);
        }

        /// The next `count` calls fail with `error` before any answer is served
        pub fn fail_next(&self, count: usize, error: UpstreamError) {
            let mut failures = self.failures.lock().unwrap();
            for _ in 0..count {
                failures.push_back(error.clone());
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<(String, Instant)> {
            self.calls.lock().unwrap().clone()
        }

        fn answer(&self, label: String, table: &Mutex<HashMap<String, Vec<Value>>>, key: &str) -> Result<Vec<Value>, UpstreamError> {
            self.calls.lock().unwrap().push((label, Instant::now()));
            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            Ok(table.lock().unwrap().get(key).cloned().unwrap_or_default())
        }
    }

    #[async_trait]
    impl QuoteProvider for ScriptedProvider {
        async fn search_pairs(&self, query: &str) -> Result<Vec<Value>, UpstreamError> {
            self.answer(format!("search:{}", query), &self.searches, query)
        }

        async fn token_pairs(&self, token_address: &str) -> Result<Vec<Value>, UpstreamError> {
            self.answer(format!("token:{}", token_address), &self.tokens, token_address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::ScriptedProvider;
    use super::*;
    use crate::types::fixtures::pair;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_base_url_trailing_slash() {
        let client = assert_ok!(DexScreenerClient::new("https://api.dexscreener.com/", Duration::from_secs(5)));
        assert_eq!(client.base_url(), "https://api.dexscreener.com");
    }

    #[test]
    fn test_response_without_pairs() {
        let body: PairsResponse = serde_json::from_str(r#"{"schemaVersion":"1.0.0","pairs":null}"#).unwrap();
        assert!(body.pairs.unwrap_or_default().is_empty());

        let body: PairsResponse = serde_json::from_str(r#"{"schemaVersion":"1.0.0"}"#).unwrap();
        assert!(body.pairs.is_none());
    }

    #[tokio::test]
    async fn test_scripted_provider_failures_then_answers() {
        let provider = ScriptedProvider::new();
        provider.on_search("0xpool", &[pair("0xpool", "0xa", "0xb", 1.0, 20_000.0)]);
        provider.fail_next(1, UpstreamError::RateLimited);

        assert_err!(provider.search_pairs("0xpool").await);
        let records = assert_ok!(provider.search_pairs("0xpool").await);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["priceNative"], "1");

        let unknown = assert_ok!(provider.token_pairs("0xnothing").await);
        assert!(unknown.is_empty());
        assert_eq!(provider.call_count(), 3);
    }
}
