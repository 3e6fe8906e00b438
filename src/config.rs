//! Configuration management
//!
//! Scanner settings from an optional TOML file, then environment overrides
//! (a `.env` file is loaded first if present).
//!
//! ```toml
//! [provider]
//! base_url = "https://api.dexscreener.com"
//! timeout_secs = 10
//!
//! [rate_limit]
//! max_calls = 60
//! interval_secs = 60
//! min_delay_ms = 0
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 1000
//! backoff_factor = 2
//! max_jitter_ms = 250
//!
//! [cache]
//! staleness = "ttl"       # or "probe"
//! ttl_secs = 30
//! file = "data/contracts.json"
//!
//! [scan]
//! min_liquidity_usd = 10000.0
//! third_leg_min_liquidity_usd = 1.0
//! require_same_chain = true
//! concurrency = 4
//! mode = "triangular"     # or "two_leg"
//! ```
//!
//! Author: AI-Generated
//! Created: 2026-01-28
//! Modified: 2026-10-18 - TOML scanner config with env overrides

use crate::arbitrage::scanner::{ScanMode, ScanSettings};
use crate::arbitrage::triangulate::TriangulationSettings;
use crate::cache::{ContractStore, JsonContractStore, MemoryContractStore, StalenessPolicy};
use crate::gateway::{RateLimiter, RetryPolicy, DEFAULT_BASE_URL};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub provider: ProviderConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_timeout() -> u64 { 10 }

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_calls")]
    pub max_calls: u32,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub min_delay_ms: u64,
}

fn default_max_calls() -> u32 { 60 }
fn default_interval() -> u64 { 60 }

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            interval_secs: default_interval(),
            min_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
    #[serde(default = "default_max_jitter")]
    pub max_jitter_ms: u64,
}

fn default_max_attempts() -> u32 { 3 }
fn default_base_delay() -> u64 { 1000 }
fn default_backoff_factor() -> u32 { 2 }
fn default_max_jitter() -> u64 { 250 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            backoff_factor: default_backoff_factor(),
            max_jitter_ms: default_max_jitter(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessKind {
    #[default]
    Ttl,
    Probe,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub staleness: StalenessKind,
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// JSON store path; in-memory when unset
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_ttl() -> u64 { 30 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            staleness: StalenessKind::default(),
            ttl_secs: default_ttl(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeConfig {
    TwoLeg,
    #[default]
    Triangular,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity_usd: f64,
    #[serde(default = "default_third_leg_min_liquidity")]
    pub third_leg_min_liquidity_usd: f64,
    #[serde(default = "default_true")]
    pub require_same_chain: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub mode: ModeConfig,
}

fn default_min_liquidity() -> f64 { crate::types::MIN_LIQUIDITY_USD }
fn default_third_leg_min_liquidity() -> f64 { crate::arbitrage::triangulate::DEFAULT_THIRD_LEG_MIN_LIQUIDITY_USD }
fn default_true() -> bool { true }
fn default_concurrency() -> usize { crate::arbitrage::scanner::DEFAULT_CONCURRENCY }

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_liquidity_usd: default_min_liquidity(),
            third_leg_min_liquidity_usd: default_third_leg_min_liquidity(),
            require_same_chain: true,
            concurrency: default_concurrency(),
            mode: ModeConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Load `.env`, then the TOML file if given and present, then env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                let config = Self::from_toml(&content)?;
                info!("Configuration loaded from {}", path.display());
                config
            }
            Some(path) => {
                info!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from `DEXSCREENER_BASE_URL`, `SCANNER_MAX_CALLS`,
    /// `SCANNER_INTERVAL_SECS`, `SCANNER_CACHE_FILE`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DEXSCREENER_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Some(max_calls) = lookup("SCANNER_MAX_CALLS") {
            self.rate_limit.max_calls = max_calls
                .trim()
                .parse()
                .with_context(|| format!("SCANNER_MAX_CALLS is not a number: {}", max_calls))?;
        }
        if let Some(interval) = lookup("SCANNER_INTERVAL_SECS") {
            self.rate_limit.interval_secs = interval
                .trim()
                .parse()
                .with_context(|| format!("SCANNER_INTERVAL_SECS is not a number: {}", interval))?;
        }
        if let Some(file) = lookup("SCANNER_CACHE_FILE") {
            self.cache.file = Some(PathBuf::from(file));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.rate_limit.max_calls, Duration::from_secs(self.rate_limit.interval_secs))
            .with_min_delay(Duration::from_millis(self.rate_limit.min_delay_ms))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            backoff_factor: self.retry.backoff_factor,
            max_jitter: Duration::from_millis(self.retry.max_jitter_ms),
        }
    }

    pub fn staleness_policy(&self) -> StalenessPolicy {
        match self.cache.staleness {
            StalenessKind::Ttl => StalenessPolicy::Ttl(Duration::from_secs(self.cache.ttl_secs)),
            StalenessKind::Probe => StalenessPolicy::Probe,
        }
    }

    pub fn contract_store(&self) -> Result<Arc<dyn ContractStore>> {
        match &self.cache.file {
            Some(path) => {
                let store = JsonContractStore::open(path)
                    .with_context(|| format!("Failed to open contract store {}", path.display()))?;
                Ok(Arc::new(store))
            }
            None => Ok(Arc::new(MemoryContractStore::new())),
        }
    }

    pub fn scan_mode(&self) -> ScanMode {
        match self.scan.mode {
            ModeConfig::TwoLeg => ScanMode::TwoLeg,
            ModeConfig::Triangular => ScanMode::Triangular,
        }
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            min_liquidity_usd: self.scan.min_liquidity_usd,
            triangulation: TriangulationSettings {
                require_same_chain: self.scan.require_same_chain,
                min_third_liquidity_usd: self.scan.third_leg_min_liquidity_usd,
            },
            concurrency: self.scan.concurrency,
        }
    }
}
