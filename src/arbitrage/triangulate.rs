//! Pair Matcher (three-leg stage)
//!
//! Closes two-leg candidates into triangles. The closing market is chosen
//! from the candidate's token multiset:
//!   - two tokens appear once           -> market between those two
//!   - one appears once, one is shared  -> market between them
//!   - two tokens are shared            -> market between the shared tokens
//!
//! Lookup order for the closing market:
//!   1. contract cache; fresh entries reuse their snapshot, stale ones are re-resolved
//!   2. on a miss, every market of the first endpoint token is fetched and recorded
//!
//! Author: AI-Generated
//! Created: 2026-10-18

use crate::arbitrage::discrepancy::{price_discrepancies, quote_prices_usd};
use crate::arbitrage::matcher::TradeParams;
use crate::arbitrage::profit::{normalize_profit, three_leg_profit};
use crate::cache::ContractCache;
use crate::error::ScanResult;
use crate::gateway::QuoteGateway;
use crate::types::{ArbitrageOpportunity, CanonicalKey, TradingPair, TriangularOpportunity};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Third-leg USD liquidity must exceed this
pub const DEFAULT_THIRD_LEG_MIN_LIQUIDITY_USD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangulationSettings {
    /// Both legs of a candidate, and the closing market, must share a chain
    pub require_same_chain: bool,
    pub min_third_liquidity_usd: f64,
}

impl Default for TriangulationSettings {
    fn default() -> Self {
        Self {
            require_same_chain: true,
            min_third_liquidity_usd: DEFAULT_THIRD_LEG_MIN_LIQUIDITY_USD,
        }
    }
}

#[derive(Debug, Default)]
pub struct TriangulationOutcome {
    pub triangles: Vec<TriangularOpportunity>,
    /// Candidates for which no usable closing market was found
    pub unclosed: usize,
    pub duplicates: usize,
    pub deadline_hit: bool,
}

/// Endpoints of the closing market for a two-leg candidate.
/// `None` if a token is missing or the multiset has no usable shape.
pub fn third_leg_endpoints(opp: &ArbitrageOpportunity) -> Option<(String, String)> {
    let mut counts: Vec<(&str, usize)> = Vec::with_capacity(4);
    for token in opp.token_addresses() {
        if TradingPair::is_sentinel(token) {
            return None;
        }
        match counts.iter_mut().find(|(t, _)| *t == token) {
            Some((_, n)) => *n += 1,
            None => counts.push((token, 1)),
        }
    }

    let unique: Vec<&str> = counts.iter().filter(|(_, n)| *n == 1).map(|(t, _)| *t).collect();
    let shared: Vec<&str> = counts.iter().filter(|(_, n)| *n > 1).map(|(t, _)| *t).collect();

    let sorted = |a: &str, b: &str| {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    };

    match (unique.len(), shared.len()) {
        (2, _) => Some(sorted(unique[0], unique[1])),
        (1, 1) => Some((unique[0].to_string(), shared[0].to_string())),
        (0, 2) => Some(sorted(shared[0], shared[1])),
        _ => None,
    }
}

/// Closing conversion from `exit_token` back toward the entry token:
/// (price, pool-side liquidity of the token sold into the market)
fn closing_quote(leg3: &TradingPair, exit_token: &str) -> (f64, f64) {
    if leg3.quote_token_address == exit_token && leg3.base_token_address != exit_token {
        (1.0 / leg3.price_native, leg3.liquidity_quote)
    } else {
        (leg3.price_native, leg3.liquidity_base)
    }
}

pub struct Triangulator<'a> {
    gateway: &'a QuoteGateway,
    cache: &'a ContractCache,
    params: TradeParams,
    settings: TriangulationSettings,
}

impl<'a> Triangulator<'a> {
    pub fn new(
        gateway: &'a QuoteGateway,
        cache: &'a ContractCache,
        params: TradeParams,
        settings: TriangulationSettings,
    ) -> Self {
        Self {
            gateway,
            cache,
            params,
            settings,
        }
    }

    /// Try to close every candidate, in order. Stops looking up closing
    /// markets once `deadline` passes; candidates already closed are kept.
    pub async fn extend(
        &self,
        candidates: &[ArbitrageOpportunity],
        deadline: Option<Instant>,
    ) -> ScanResult<TriangulationOutcome> {
        let mut outcome = TriangulationOutcome::default();
        let mut seen: HashSet<CanonicalKey> = HashSet::new();
        let mut lookups: HashMap<(String, String, String), Option<TradingPair>> = HashMap::new();

        for opp in candidates {
            if self.settings.require_same_chain && opp.leg1.chain_id != opp.leg2.chain_id {
                debug!(
                    "Cross-chain candidate {} / {} not closed",
                    opp.leg1.pair_address, opp.leg2.pair_address
                );
                outcome.unclosed += 1;
                continue;
            }

            let (t1, t2) = match third_leg_endpoints(opp) {
                Some(endpoints) => endpoints,
                None => {
                    debug!("No closing token pair for {} / {}", opp.leg1.pair_address, opp.leg2.pair_address);
                    outcome.unclosed += 1;
                    continue;
                }
            };

            let chain = opp.leg1.chain_id.clone();
            let key = (chain.clone(), t1.clone(), t2.clone());
            let leg3 = match lookups.get(&key) {
                Some(found) => found.clone(),
                None => {
                    let lookup = self.locate_third_leg(&chain, &t1, &t2);
                    let found = match deadline {
                        Some(at) => match timeout_at(at, lookup).await {
                            Ok(result) => result?,
                            Err(_) => {
                                warn!("Deadline reached while closing triangles, keeping {} found so far", outcome.triangles.len());
                                outcome.deadline_hit = true;
                                break;
                            }
                        },
                        None => lookup.await?,
                    };
                    lookups.insert(key, found.clone());
                    found
                }
            };

            let leg3 = match leg3.filter(|p| p.pair_address != opp.leg1.pair_address && p.pair_address != opp.leg2.pair_address) {
                Some(leg3) => leg3,
                None => {
                    outcome.unclosed += 1;
                    continue;
                }
            };

            let canonical_key = CanonicalKey::from_legs(&[&opp.leg1, &opp.leg2, &leg3]);
            if seen.contains(&canonical_key) {
                debug!("Duplicate triangle {}", canonical_key);
                outcome.duplicates += 1;
                continue;
            }

            if let Some(triangle) = self.close(opp, leg3, canonical_key.clone())? {
                seen.insert(canonical_key);
                outcome.triangles.push(triangle);
            }
        }

        info!(
            "Closed {} triangles from {} candidates ({} unclosed, {} duplicates)",
            outcome.triangles.len(),
            candidates.len(),
            outcome.unclosed,
            outcome.duplicates
        );
        Ok(outcome)
    }

    /// Price the cycle through `leg3`; `Ok(None)` if it does not pay.
    fn close(
        &self,
        opp: &ArbitrageOpportunity,
        leg3: TradingPair,
        canonical_key: CanonicalKey,
    ) -> ScanResult<Option<TriangularOpportunity>> {
        let (price3, liquidity3) = closing_quote(&leg3, &opp.exit_token);

        let cycle_profit = three_leg_profit(
            self.params.investment,
            opp.price1,
            opp.price2,
            price3,
            self.params.slippage.leg1,
            self.params.slippage.leg2,
            self.params.fee_rate,
            opp.model_liquidity1,
            opp.model_liquidity2,
            liquidity3,
        )?;

        if normalize_profit(cycle_profit) <= Decimal::ZERO {
            debug!("Triangle {} does not pay: {:.8}", canonical_key, cycle_profit);
            return Ok(None);
        }

        let legs = [&opp.leg1, &opp.leg2, &leg3];
        let quote_prices = quote_prices_usd(legs);
        let discrepancies = price_discrepancies(legs);

        info!(
            "Triangle: {} -> {} -> {} | cycle profit {:.8}",
            opp.leg1.symbol(),
            opp.leg2.symbol(),
            leg3.symbol(),
            cycle_profit
        );

        Ok(Some(TriangularOpportunity {
            two_leg: opp.clone(),
            leg3,
            price3,
            cycle_profit,
            canonical_key,
            quote_prices_usd: quote_prices,
            discrepancies,
        }))
    }

    /// Find a usable market between `t1` and `t2`
    async fn locate_third_leg(&self, chain: &str, t1: &str, t2: &str) -> ScanResult<Option<TradingPair>> {
        let chain_filter = self.settings.require_same_chain.then_some(chain);
        let cached = self.cache.find_connecting(chain_filter, t1, t2);

        if !cached.is_empty() {
            let stale = self.cache.is_stale(&cached, self.gateway).await?;
            let snapshots: Vec<TradingPair> = if stale {
                Vec::new()
            } else {
                cached.iter().filter_map(|addr| self.cache.snapshot(addr)).collect()
            };

            if !snapshots.is_empty() {
                if let Some(found) = self.best_candidate(snapshots.iter(), chain, t1, t2) {
                    debug!("Closing market {} served from cache", found.pair_address);
                    return Ok(Some(found.clone()));
                }
            }

            let refreshed = self.gateway.resolve_batch(&cached).await?;
            self.cache.record_pairs(&refreshed)?;
            if let Some(found) = self.best_candidate(refreshed.iter(), chain, t1, t2) {
                debug!("Closing market {} re-resolved", found.pair_address);
                return Ok(Some(found.clone()));
            }
        }

        let fetched = self.gateway.pairs_for_token(t1).await?;
        self.cache.record_pairs(&fetched)?;
        Ok(self.best_candidate(fetched.iter(), chain, t1, t2).cloned())
    }

    /// Deepest qualifying market; ties go to the lower address
    fn best_candidate<'p, I>(&self, pairs: I, chain: &str, t1: &str, t2: &str) -> Option<&'p TradingPair>
    where
        I: Iterator<Item = &'p TradingPair>,
    {
        pairs
            .filter(|p| self.qualifies(p, chain, t1, t2))
            .fold(None, |best: Option<&TradingPair>, p| match best {
                Some(b)
                    if b.liquidity_usd > p.liquidity_usd
                        || (b.liquidity_usd == p.liquidity_usd && b.pair_address <= p.pair_address) =>
                {
                    Some(b)
                }
                _ => Some(p),
            })
    }

    fn qualifies(&self, pair: &TradingPair, chain: &str, t1: &str, t2: &str) -> bool {
        pair.is_eligible()
            && pair.connects(t1, t2)
            && (!self.settings.require_same_chain || pair.chain_id == chain)
            && pair.liquidity_usd > self.settings.min_third_liquidity_usd
            && pair.liquidity_base > 0.0
            && pair.liquidity_quote > 0.0
    }
}
