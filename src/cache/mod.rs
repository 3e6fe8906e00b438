//! Contract Cache
//!
//! Last-known state per pair address, kept in a concurrent map in front of
//! a `ContractStore`. Each entry carries the full `TradingPair` last seen
//! for its address so fresh entries can be reused without a provider call.
//! `open` warms the map from the store, so a persistent store serves
//! lookups across restarts.
//!
//! Staleness:
//! - `Ttl`: an entry older than the TTL is stale (default 30s)
//! - `Probe`: re-query the provider and compare `price_native`
//!
//! Author: AI-Generated
//! Created: 2026-10-18

pub mod store;

pub use store::{ContractStore, JsonContractStore, MemoryContractStore};

use crate::error::ScanResult;
use crate::gateway::QuoteGateway;
use crate::types::{ContractCacheEntry, TradingPair};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessPolicy {
    /// Entries older than this are stale
    Ttl(Duration),
    /// Ask the provider for a fresh quote and compare prices
    Probe,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        StalenessPolicy::Ttl(DEFAULT_TTL)
    }
}

pub struct ContractCache {
    entries: Arc<DashMap<String, ContractCacheEntry>>,
    store: Arc<dyn ContractStore>,
    policy: StalenessPolicy,
}

impl ContractCache {
    pub fn new(store: Arc<dyn ContractStore>, policy: StalenessPolicy) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            store,
            policy,
        }
    }

    /// Cache over `store`, preloaded with everything the store holds
    pub fn open(store: Arc<dyn ContractStore>, policy: StalenessPolicy) -> ScanResult<Self> {
        let cache = Self::new(store, policy);
        let loaded = cache.warm()?;
        if loaded > 0 {
            info!("Contract cache warmed with {} entries", loaded);
        }
        Ok(cache)
    }

    /// Copy every stored entry into memory. Returns how many were loaded.
    pub fn warm(&self) -> ScanResult<usize> {
        let stored = self.store.load_all()?;
        let loaded = stored.len();
        for entry in stored {
            self.entries.insert(entry.pair_address.clone(), entry);
        }
        Ok(loaded)
    }

    /// Cache backed by a process-local store
    pub fn in_memory(policy: StalenessPolicy) -> Self {
        Self::new(Arc::new(MemoryContractStore::new()), policy)
    }

    pub fn policy(&self) -> StalenessPolicy {
        self.policy
    }

    /// Entry for `address`, falling back to the store on a miss
    pub fn get(&self, address: &str) -> ScanResult<Option<ContractCacheEntry>> {
        if let Some(entry) = self.entries.get(address) {
            return Ok(Some(entry.value().clone()));
        }

        let found = self.store.find_contract_by_address(address)?;
        if let Some(entry) = &found {
            self.entries.insert(address.to_string(), entry.clone());
        }
        Ok(found)
    }

    /// Upsert an entry into memory and the backing store
    pub fn put(&self, entry: ContractCacheEntry) -> ScanResult<()> {
        self.store.upsert_contract(&entry)?;
        self.entries.insert(entry.pair_address.clone(), entry);
        Ok(())
    }

    /// Record freshly resolved pairs with the current time.
    /// Pairs without a real address are not cacheable and are skipped.
    pub fn record_pairs(&self, pairs: &[TradingPair]) -> ScanResult<()> {
        let now = Utc::now();
        let entries: Vec<ContractCacheEntry> = pairs
            .iter()
            .filter(|p| !TradingPair::is_sentinel(&p.pair_address))
            .map(|p| ContractCacheEntry::from_pair(p, now))
            .collect();

        self.store.upsert_contracts(&entries)?;
        for entry in entries {
            self.entries.insert(entry.pair_address.clone(), entry);
        }
        Ok(())
    }

    /// Last full pair recorded for `address`
    pub fn snapshot(&self, address: &str) -> Option<TradingPair> {
        self.entries.get(address).and_then(|e| e.value().pair.clone())
    }

    /// Addresses of cached markets trading exactly `a` and `b`, sorted.
    /// `chain` restricts the search to one chain when given.
    pub fn find_connecting(&self, chain: Option<&str>, a: &str, b: &str) -> Vec<String> {
        let mut found: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().connects(a, b))
            .filter(|e| chain.map_or(true, |c| e.value().chain_id == c))
            .map(|e| e.key().clone())
            .collect();
        found.sort();
        found
    }

    /// True if any of `addresses` is missing, expired, or (under `Probe`)
    /// quoted at a different price by the provider.
    pub async fn is_stale(&self, addresses: &[String], gateway: &QuoteGateway) -> ScanResult<bool> {
        for address in addresses {
            let entry = match self.get(address)? {
                Some(entry) => entry,
                None => {
                    debug!("{} not cached, treating as stale", address);
                    return Ok(true);
                }
            };

            match self.policy {
                StalenessPolicy::Ttl(ttl) => {
                    let expired = Utc::now()
                        .signed_duration_since(entry.last_updated)
                        .to_std()
                        .map(|age| age > ttl)
                        .unwrap_or(false);
                    if expired {
                        debug!("{} older than {:?}", address, ttl);
                        return Ok(true);
                    }
                }
                StalenessPolicy::Probe => {
                    let quotes = gateway.resolve(address).await?;
                    let moved = quotes
                        .iter()
                        .any(|q| q.pair_address == *address && q.price_native != entry.price_native);
                    if moved {
                        debug!("{} price moved since {}", address, entry.last_updated);
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Clone for ContractCache {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }
}

impl Default for ContractCache {
    fn default() -> Self {
        Self::in_memory(StalenessPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::provider::scripted::ScriptedProvider;
    use crate::gateway::{RateLimiter, RetryPolicy};
    use crate::types::fixtures::pair;
    use tokio_test::assert_ok;

    fn gateway(provider: Arc<ScriptedProvider>) -> QuoteGateway {
        QuoteGateway::new(
            provider,
            Arc::new(RateLimiter::new(60, Duration::from_secs(60))),
            RetryPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_missing_entry_is_stale() {
        let provider = Arc::new(ScriptedProvider::new());
        let cache = ContractCache::default();

        let stale = assert_ok!(cache.is_stale(&["0xnowhere".to_string()], &gateway(provider)).await);
        assert!(stale);
    }

    #[tokio::test]
    async fn test_ttl_policy() {
        let provider = Arc::new(ScriptedProvider::new());
        let gw = gateway(Arc::clone(&provider));
        let cache = ContractCache::in_memory(StalenessPolicy::Ttl(Duration::from_secs(30)));

        let fresh = pair("0xfresh", "0xa", "0xb", 1.0, 20_000.0);
        assert_ok!(cache.record_pairs(&[fresh]));
        assert!(!assert_ok!(cache.is_stale(&["0xfresh".to_string()], &gw).await));

        let old = pair("0xold", "0xa", "0xc", 1.0, 20_000.0);
        let mut entry = ContractCacheEntry::from_pair(&old, Utc::now());
        entry.last_updated = Utc::now() - chrono::Duration::seconds(120);
        assert_ok!(cache.put(entry));

        assert!(assert_ok!(cache.is_stale(&["0xold".to_string()], &gw).await));
        assert!(assert_ok!(cache.is_stale(&["0xfresh".to_string(), "0xold".to_string()], &gw).await));
        // TTL never calls upstream
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_probe_policy_compares_prices() {
        let provider = Arc::new(ScriptedProvider::new());
        let gw = gateway(Arc::clone(&provider));
        let cache = ContractCache::in_memory(StalenessPolicy::Probe);

        let cached = pair("0xpool", "0xa", "0xb", 1.0, 20_000.0);
        assert_ok!(cache.record_pairs(&[cached.clone()]));

        provider.on_search("0xpool", &[cached]);
        assert!(!assert_ok!(cache.is_stale(&["0xpool".to_string()], &gw).await));

        provider.on_search("0xpool", &[pair("0xpool", "0xa", "0xb", 1.01, 20_000.0)]);
        assert!(assert_ok!(cache.is_stale(&["0xpool".to_string()], &gw).await));
        assert_eq!(provider.call_count(), 2);
    }

    #[test]
    fn test_find_connecting_and_snapshots() {
        let cache = ContractCache::default();
        let mut polygon = pair("0xp3", "0xb", "0xa", 1.0, 20_000.0);
        polygon.chain_id = "polygon".to_string();
        assert_ok!(cache.record_pairs(&[
            pair("0xp2", "0xa", "0xb", 1.0, 20_000.0),
            pair("0xp1", "0xb", "0xa", 1.0, 20_000.0),
            pair("0xp9", "0xa", "0xc", 1.0, 20_000.0),
            polygon,
        ]));

        assert_eq!(cache.find_connecting(Some("ethereum"), "0xa", "0xb"), vec!["0xp1", "0xp2"]);
        assert_eq!(cache.find_connecting(None, "0xb", "0xa").len(), 3);
        assert_eq!(cache.snapshot("0xp9").map(|p| p.quote_token_address), Some("0xc".to_string()));
        assert!(cache.snapshot("0xunknown").is_none());
    }

    #[test]
    fn test_falls_back_to_store() {
        let store = Arc::new(MemoryContractStore::new());
        let entry = ContractCacheEntry::from_pair(&pair("0xpool", "0xa", "0xb", 1.0, 20_000.0), Utc::now());
        assert_ok!(store.upsert_contract(&entry));

        let cache = ContractCache::new(store, StalenessPolicy::default());
        assert!(cache.is_empty());
        assert_eq!(assert_ok!(cache.get("0xpool")), Some(entry));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_open_warms_from_persisted_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contracts.json");
        {
            let store = Arc::new(assert_ok!(JsonContractStore::open(&path)));
            let cache = ContractCache::new(store, StalenessPolicy::default());
            assert_ok!(cache.record_pairs(&[pair("0xpoolC", "0xq2", "0xq1", 1.0, 80_000.0)]));
        }

        let store = Arc::new(assert_ok!(JsonContractStore::open(&path)));
        let cache = assert_ok!(ContractCache::open(store, StalenessPolicy::default()));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.find_connecting(Some("ethereum"), "0xq1", "0xq2"), vec!["0xpoolC"]);
        assert_eq!(cache.snapshot("0xpoolC").map(|p| p.liquidity_usd), Some(80_000.0));
    }

    #[test]
    fn test_sentinel_pairs_not_recorded() {
        let cache = ContractCache::default();
        let mut broken = pair("0xpool", "0xa", "0xb", 1.0, 20_000.0);
        broken.pair_address = crate::types::SENTINEL.to_string();

        assert_ok!(cache.record_pairs(&[broken]));
        assert!(cache.is_empty());
    }
}
