//! Arbitrage Module
//!
//! Opportunity detection over provider-quoted pairs: the profit model,
//! two-leg matching, triangle closing, ranking, and the scan that ties them
//! together.
//!
//! Author: AI-Generated
//! Created: 2026-01-27
//! Modified: 2026-10-18 - Cross-DEX pair matching and triangular closing

pub mod discrepancy;
pub mod matcher;
pub mod profit;
pub mod ranker;
pub mod scanner;
pub mod triangulate;

pub use matcher::{PairMatcher, Slippage, TradeParams};
pub use profit::{chain_profit, normalize_profit, three_leg_profit, two_leg_profit};
pub use ranker::rank;
pub use scanner::{OpportunityScanner, ScanMode, ScanReport, ScanRequest, ScanSettings};
pub use triangulate::{TriangulationSettings, Triangulator};
