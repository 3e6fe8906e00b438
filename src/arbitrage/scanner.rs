//! Opportunity Scanner
//!
//! `find_opportunities`: resolve seed addresses through the gateway, record
//! every resolved pair in the contract cache, match two-leg candidates, close
//! them into triangles when requested, and rank the result.
//!
//! Seeds resolve concurrently (bounded) but are consumed in seed order, so
//! identical inputs over unchanged upstream data give identical output.
//! A deadline skips seeds not yet resolved and stops third-leg lookups;
//! whatever was found before it is still matched and ranked.
//!
//! Author: AI-Generated
//! Created: 2026-10-18

use crate::arbitrage::matcher::{PairMatcher, TradeParams};
use crate::arbitrage::ranker::rank;
use crate::arbitrage::triangulate::{TriangulationSettings, Triangulator};
use crate::cache::ContractCache;
use crate::error::ScanResult;
use crate::gateway::QuoteGateway;
use crate::types::{Opportunity, TradingPair, MIN_LIQUIDITY_USD};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Which opportunities a scan surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Two-leg candidates as-is
    TwoLeg,
    /// Only candidates closed by a third market
    #[default]
    Triangular,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSettings {
    pub min_liquidity_usd: f64,
    pub triangulation: TriangulationSettings,
    /// Seed resolutions in flight at once
    pub concurrency: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            min_liquidity_usd: MIN_LIQUIDITY_USD,
            triangulation: TriangulationSettings::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Token or pair addresses (any search query works)
    pub seeds: Vec<String>,
    pub params: TradeParams,
    pub mode: ScanMode,
    /// Budget for the whole scan, measured from the call
    pub deadline: Option<Duration>,
}

impl ScanRequest {
    pub fn new(seeds: Vec<String>, params: TradeParams) -> Self {
        Self {
            seeds,
            params,
            mode: ScanMode::default(),
            deadline: None,
        }
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Ranked opportunities plus what the scan went through to find them
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub opportunities: Vec<Opportunity>,
    pub seeds_resolved: usize,
    pub seeds_skipped: usize,
    pub pairs_considered: usize,
    pub two_leg_candidates: usize,
    pub third_legs_found: usize,
    pub deadline_hit: bool,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.opportunities.is_empty()
    }
}

pub struct OpportunityScanner {
    gateway: Arc<QuoteGateway>,
    cache: ContractCache,
    settings: ScanSettings,
}

impl OpportunityScanner {
    pub fn new(gateway: Arc<QuoteGateway>, cache: ContractCache, settings: ScanSettings) -> Self {
        Self {
            gateway,
            cache,
            settings,
        }
    }

    pub fn gateway(&self) -> &QuoteGateway {
        &self.gateway
    }

    pub fn cache(&self) -> &ContractCache {
        &self.cache
    }

    pub async fn find_opportunities(&self, request: &ScanRequest) -> ScanResult<ScanReport> {
        let deadline = request.deadline.map(|budget| Instant::now() + budget);
        let mut report = ScanReport::default();

        let pairs = self.resolve_seeds(&request.seeds, deadline, &mut report).await?;
        report.pairs_considered = pairs.len();

        let matcher = PairMatcher::new(request.params).with_min_liquidity(self.settings.min_liquidity_usd);
        let candidates = matcher.find_two_leg(&pairs)?;
        report.two_leg_candidates = candidates.len();

        let surfaced: Vec<Opportunity> = match request.mode {
            ScanMode::TwoLeg => candidates.into_iter().map(Opportunity::TwoLeg).collect(),
            ScanMode::Triangular => {
                let triangulator = Triangulator::new(
                    &self.gateway,
                    &self.cache,
                    request.params,
                    self.settings.triangulation,
                );
                let outcome = triangulator.extend(&candidates, deadline).await?;
                report.third_legs_found = outcome.triangles.len();
                report.deadline_hit |= outcome.deadline_hit;
                outcome.triangles.into_iter().map(Opportunity::Triangular).collect()
            }
        };

        report.opportunities = rank(surfaced);

        info!(
            "Scan complete: {} seeds resolved ({} skipped), {} pairs, {} two-leg candidates, {} opportunities{}",
            report.seeds_resolved,
            report.seeds_skipped,
            report.pairs_considered,
            report.two_leg_candidates,
            report.opportunities.len(),
            if report.deadline_hit { " (deadline hit)" } else { "" }
        );

        Ok(report)
    }

    /// Resolve seeds in order, dropping repeated seeds and repeated pairs
    async fn resolve_seeds(
        &self,
        seeds: &[String],
        deadline: Option<Instant>,
        report: &mut ScanReport,
    ) -> ScanResult<Vec<TradingPair>> {
        let mut unique_seeds = HashSet::new();
        let seeds: Vec<&str> = seeds
            .iter()
            .map(|s| s.trim())
            .filter(|s| !TradingPair::is_sentinel(s))
            .filter(|s| unique_seeds.insert(*s))
            .collect();

        let gateway = &self.gateway;
        let mut results = stream::iter(seeds)
            .map(move |seed| async move {
                let resolved = match deadline {
                    Some(at) => timeout_at(at, gateway.resolve(seed)).await.ok(),
                    None => Some(gateway.resolve(seed).await),
                };
                (seed, resolved)
            })
            .buffered(self.settings.concurrency.max(1));

        let mut seen_pairs = HashSet::new();
        let mut pairs = Vec::new();

        while let Some((seed, resolved)) = results.next().await {
            match resolved {
                Some(Ok(found)) => {
                    report.seeds_resolved += 1;
                    self.cache.record_pairs(&found)?;
                    for pair in found {
                        if seen_pairs.insert(pair.pair_address.clone()) {
                            pairs.push(pair);
                        }
                    }
                }
                Some(Err(e)) => return Err(e),
                None => {
                    if !report.deadline_hit {
                        warn!("Deadline reached at seed {}, skipping the rest", seed);
                    }
                    report.deadline_hit = true;
                    report.seeds_skipped += 1;
                }
            }
        }

        Ok(pairs)
    }
}
