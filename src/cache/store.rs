//! Contract Store
//!
//! Persistence behind the contract cache. Two implementations:
//! - `MemoryContractStore`: process-local, lost on exit
//! - `JsonContractStore`: one JSON file, rewritten atomically on every upsert
//!
//! Author: AI-Generated
//! Created: 2026-10-18

use crate::error::{ScanError, ScanResult};
use crate::types::ContractCacheEntry;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

pub trait ContractStore: Send + Sync {
    fn find_contract_by_address(&self, address: &str) -> ScanResult<Option<ContractCacheEntry>>;

    fn upsert_contract(&self, entry: &ContractCacheEntry) -> ScanResult<()>;

    /// Every stored entry, used to warm the cache at startup
    fn load_all(&self) -> ScanResult<Vec<ContractCacheEntry>>;

    fn upsert_contracts(&self, entries: &[ContractCacheEntry]) -> ScanResult<()> {
        for entry in entries {
            self.upsert_contract(entry)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryContractStore {
    contracts: DashMap<String, ContractCacheEntry>,
}

impl MemoryContractStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

impl ContractStore for MemoryContractStore {
    fn find_contract_by_address(&self, address: &str) -> ScanResult<Option<ContractCacheEntry>> {
        Ok(self.contracts.get(address).map(|e| e.value().clone()))
    }

    fn upsert_contract(&self, entry: &ContractCacheEntry) -> ScanResult<()> {
        self.contracts.insert(entry.pair_address.clone(), entry.clone());
        Ok(())
    }

    fn load_all(&self) -> ScanResult<Vec<ContractCacheEntry>> {
        Ok(self.contracts.iter().map(|e| e.value().clone()).collect())
    }
}

/// On-disk layout of the JSON store
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    updated: DateTime<Utc>,
    contracts: Vec<ContractCacheEntry>,
}

pub struct JsonContractStore {
    path: PathBuf,
    contracts: RwLock<HashMap<String, ContractCacheEntry>>,
}

impl JsonContractStore {
    /// Open the store at `path`, starting empty if the file does not exist yet
    pub fn open<P: AsRef<Path>>(path: P) -> ScanResult<Self> {
        let path = path.as_ref().to_path_buf();

        let contracts = if path.exists() {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| ScanError::Store(format!("read {}: {}", path.display(), e)))?;
            let file: StoreFile = serde_json::from_str(&json)
                .map_err(|e| ScanError::Store(format!("parse {}: {}", path.display(), e)))?;
            info!("Loaded {} cached contracts from {}", file.contracts.len(), path.display());
            file.contracts
                .into_iter()
                .map(|entry| (entry.pair_address.clone(), entry))
                .collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            contracts: RwLock::new(contracts),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.contracts.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, contracts: &HashMap<String, ContractCacheEntry>) -> ScanResult<()> {
        let mut entries: Vec<ContractCacheEntry> = contracts.values().cloned().collect();
        entries.sort_by(|a, b| a.pair_address.cmp(&b.pair_address));

        let file = StoreFile {
            updated: Utc::now(),
            contracts: entries,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| ScanError::Store(format!("serialize: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ScanError::Store(format!("create {}: {}", parent.display(), e)))?;
            }
        }

        // Write to temp file first, then rename (atomic)
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, json)
            .map_err(|e| ScanError::Store(format!("write {}: {}", temp_path.display(), e)))?;
        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| ScanError::Store(format!("rename to {}: {}", self.path.display(), e)))?;

        debug!("Persisted {} contracts to {}", file.contracts.len(), self.path.display());
        Ok(())
    }
}

impl ContractStore for JsonContractStore {
    fn find_contract_by_address(&self, address: &str) -> ScanResult<Option<ContractCacheEntry>> {
        let contracts = self
            .contracts
            .read()
            .map_err(|_| ScanError::Store("contract store lock poisoned".to_string()))?;
        Ok(contracts.get(address).cloned())
    }

    fn upsert_contract(&self, entry: &ContractCacheEntry) -> ScanResult<()> {
        self.upsert_contracts(std::slice::from_ref(entry))
    }

    fn load_all(&self) -> ScanResult<Vec<ContractCacheEntry>> {
        let contracts = self
            .contracts
            .read()
            .map_err(|_| ScanError::Store("contract store lock poisoned".to_string()))?;
        Ok(contracts.values().cloned().collect())
    }

    fn upsert_contracts(&self, entries: &[ContractCacheEntry]) -> ScanResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut contracts = self
            .contracts
            .write()
            .map_err(|_| ScanError::Store("contract store lock poisoned".to_string()))?;
        for entry in entries {
            contracts.insert(entry.pair_address.clone(), entry.clone());
        }
        self.persist(&contracts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::pair;
    use tokio_test::assert_ok;

    #[test]
    fn test_memory_store_upsert_replaces() {
        let store = MemoryContractStore::new();
        let now = Utc::now();

        let first = ContractCacheEntry::from_pair(&pair("0xpool", "0xa", "0xb", 1.0, 20_000.0), now);
        let second = ContractCacheEntry::from_pair(&pair("0xpool", "0xa", "0xb", 1.2, 20_000.0), now);
        assert_ok!(store.upsert_contract(&first));
        assert_ok!(store.upsert_contract(&second));

        assert_eq!(store.len(), 1);
        let found = assert_ok!(store.find_contract_by_address("0xpool"));
        assert_eq!(found.map(|e| e.price_native), Some(1.2));
        assert_eq!(assert_ok!(store.find_contract_by_address("0xmissing")), None);
    }

    #[test]
    fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("contracts.json");
        let now = Utc::now();

        {
            let store = assert_ok!(JsonContractStore::open(&path));
            assert!(store.is_empty());
            let entries = vec![
                ContractCacheEntry::from_pair(&pair("0xp2", "0xb", "0xc", 2.0, 20_000.0), now),
                ContractCacheEntry::from_pair(&pair("0xp1", "0xa", "0xb", 1.0, 20_000.0), now),
            ];
            assert_ok!(store.upsert_contracts(&entries));
        }

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let reopened = assert_ok!(JsonContractStore::open(&path));
        assert_eq!(reopened.len(), 2);
        let entry = assert_ok!(reopened.find_contract_by_address("0xp2")).unwrap();
        assert_eq!(entry.quote_token_address, "0xc");
        assert_eq!(entry.last_updated, now);
        assert_eq!(entry.pair.map(|p| p.liquidity_usd), Some(20_000.0));
        assert_eq!(assert_ok!(reopened.load_all()).len(), 2);
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contracts.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonContractStore::open(&path).err().unwrap();
        assert!(matches!(err, ScanError::Store(_)));
    }
}
