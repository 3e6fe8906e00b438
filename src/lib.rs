//! DEX Arbitrage Scanner Library
//!
//! Finds cross-exchange arbitrage candidates from quoted trading pairs:
//! rate-limited quote gateway, contract cache, two-leg and triangular
//! matching, profit model and ranking.
//!
//! Author: AI-Generated
//! Created: 2026-01-28
//! Modified: 2026-10-18 - Quote-driven scanner replaces on-chain bot

pub mod arbitrage;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod opportunity_logger;
pub mod types;

// Re-export commonly used types
pub use arbitrage::{OpportunityScanner, ScanMode, ScanReport, ScanRequest, ScanSettings, Slippage, TradeParams};
pub use cache::{ContractCache, StalenessPolicy};
pub use config::ScannerConfig;
pub use error::{ScanError, ScanResult, UpstreamError};
pub use gateway::{DexScreenerClient, QuoteGateway, QuoteProvider, RateLimiter, RetryPolicy};
pub use opportunity_logger::OpportunityLogger;
pub use types::{ArbitrageOpportunity, Opportunity, TradingPair, TriangularOpportunity};
