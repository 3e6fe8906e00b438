//! Pair Matcher (two-leg stage)
//!
//! Compares every unordered pair of quoted markets for a shared token and
//! prices the resulting two-leg cycle through the profit model.
//!
//! Shared-token relations checked on (p1, p2):
//!   - same base token on both legs
//!   - p1's base is p2's quote (p2's price is inverted)
//!   - p1's quote is p2's base (p1's price is inverted)
//!
//! Orientation: the leg with the lower comparable price is always the buy
//! leg, the higher one the sell leg. A relation is evaluated once per
//! unordered pair; the legs are swapped when needed.
//!
//! Author: AI-Generated
//! Created: 2026-01-27
//! Modified: 2026-10-18 - Shared-token matching over provider-quoted pairs

use crate::arbitrage::profit::{normalize_profit, two_leg_profit};
use crate::error::ScanResult;
use crate::types::{ArbitrageOpportunity, ShareKind, TradingPair, MIN_LIQUIDITY_USD};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Per-leg slippage rates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slippage {
    pub leg1: f64,
    pub leg2: f64,
}

impl Slippage {
    pub fn uniform(rate: f64) -> Self {
        Self { leg1: rate, leg2: rate }
    }
}

/// Caller-supplied trade parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeParams {
    /// Initial investment, in the entry token's units
    pub investment: f64,
    pub slippage: Slippage,
    /// Flat fee per leg as a fraction of the investment (0.003 = 0.3%)
    pub fee_rate: f64,
}

/// Finds two-leg candidates among resolved pairs
#[derive(Debug, Clone)]
pub struct PairMatcher {
    params: TradeParams,
    min_liquidity_usd: f64,
}

impl PairMatcher {
    pub fn new(params: TradeParams) -> Self {
        Self {
            params,
            min_liquidity_usd: MIN_LIQUIDITY_USD,
        }
    }

    /// Override the liquidity floor (strict: a leg must exceed it)
    pub fn with_min_liquidity(mut self, min_liquidity_usd: f64) -> Self {
        self.min_liquidity_usd = min_liquidity_usd;
        self
    }

    pub fn params(&self) -> &TradeParams {
        &self.params
    }

    /// Scan all unordered pairs and return every profitable two-leg candidate,
    /// in discovery order.
    pub fn find_two_leg(&self, pairs: &[TradingPair]) -> ScanResult<Vec<ArbitrageOpportunity>> {
        let eligible: Vec<&TradingPair> = pairs
            .iter()
            .filter(|p| {
                let ok = p.is_eligible();
                if !ok {
                    debug!("Skipping ineligible pair {}", p);
                }
                ok
            })
            .collect();

        let mut opportunities = Vec::new();
        let mut combinations = 0usize;

        for i in 0..eligible.len() {
            for j in (i + 1)..eligible.len() {
                let p1 = eligible[i];
                let p2 = eligible[j];
                if p1.pair_address == p2.pair_address {
                    continue;
                }
                combinations += 1;

                for relation in shared_relations(p1, p2) {
                    if let Some(opp) = self.evaluate(p1, p2, relation)? {
                        opportunities.push(opp);
                    }
                }
            }
        }

        info!(
            "Checked {} pair combinations across {} eligible pairs, found {} two-leg candidates",
            combinations,
            eligible.len(),
            opportunities.len()
        );

        Ok(opportunities)
    }

    /// Price one relation between two markets. `Ok(None)` means the candidate was filtered;
    /// zero pool-side liquidity on a leg is `DivisionByZeroInModel`.
    pub fn evaluate(
        &self,
        p1: &TradingPair,
        p2: &TradingPair,
        relation: ShareKind,
    ) -> ScanResult<Option<ArbitrageOpportunity>> {
        if !(p1.liquidity_usd > self.min_liquidity_usd && p2.liquidity_usd > self.min_liquidity_usd) {
            debug!(
                "Insufficient liquidity: {} (${:.2}) / {} (${:.2})",
                p1.symbol(),
                p1.liquidity_usd,
                p2.symbol(),
                p2.liquidity_usd
            );
            return Ok(None);
        }

        let (a1, a2) = oriented_prices(p1, p2, relation);
        if a1 == a2 {
            debug!("No native price difference between {} and {}", p1.pair_address, p2.pair_address);
            return Ok(None);
        }

        // Buy where the comparable price is lower, sell where it is higher
        let (leg1, leg2, relation) = if a1 < a2 {
            (p1, p2, relation)
        } else {
            (p2, p1, relation.mirrored())
        };
        let (price1, price2) = oriented_prices(leg1, leg2, relation);

        // Zero pool-side liquidity is an input error and aborts the match
        let liquidity1 = model_liquidity(leg1, leg2);
        let liquidity2 = model_liquidity(leg2, leg1);
        let profit = two_leg_profit(
            self.params.investment,
            price1,
            price2,
            self.params.slippage.leg1,
            self.params.slippage.leg2,
            self.params.fee_rate,
            liquidity1,
            liquidity2,
        )
        .map_err(|e| {
            warn!("Profit model rejected {} -> {}: {}", leg1.pair_address, leg2.pair_address, e);
            e
        })?;
        let normalized_profit = normalize_profit(profit);

        if normalized_profit <= Decimal::ZERO {
            debug!(
                "No profit for {} -> {} ({}): {:.8}",
                leg1.symbol(),
                leg2.symbol(),
                relation,
                profit
            );
            return Ok(None);
        }

        let price_diff = price2 - price1;
        let base_liquidity = shared_side_liquidity(leg1, leg2, relation);
        let (entry_token, exit_token) = path_endpoints(leg1, leg2, relation);

        info!(
            "Two-leg candidate: buy {} on {} @ {:.8} | sell {} on {} @ {:.8} | {} | profit {:.8}",
            leg1.symbol(),
            leg1.dex_id,
            price1,
            leg2.symbol(),
            leg2.dex_id,
            price2,
            relation,
            profit
        );

        Ok(Some(ArbitrageOpportunity {
            leg1: leg1.clone(),
            leg2: leg2.clone(),
            relation,
            price1,
            price2,
            model_liquidity1: liquidity1,
            model_liquidity2: liquidity2,
            price_diff,
            liquidity_diff: leg1.liquidity_usd - leg2.liquidity_usd,
            base_liquidity,
            profit,
            normalized_profit,
            potential_profit: base_liquidity * price_diff,
            native_price_ratio: price2 / price1,
            entry_token,
            exit_token,
        }))
    }

    /// Re-run the profit model on a candidate's stored legs
    pub fn reprice(&self, opp: &ArbitrageOpportunity) -> ScanResult<f64> {
        let (price1, price2) = oriented_prices(&opp.leg1, &opp.leg2, opp.relation);
        two_leg_profit(
            self.params.investment,
            price1,
            price2,
            self.params.slippage.leg1,
            self.params.slippage.leg2,
            self.params.fee_rate,
            model_liquidity(&opp.leg1, &opp.leg2),
            model_liquidity(&opp.leg2, &opp.leg1),
        )
    }
}

/// Every shared-token relation between two markets. Sentinel addresses never match.
pub fn shared_relations(p1: &TradingPair, p2: &TradingPair) -> Vec<ShareKind> {
    let same = |a: &str, b: &str| !TradingPair::is_sentinel(a) && a == b;

    let mut relations = Vec::with_capacity(2);
    if same(&p1.base_token_address, &p2.base_token_address) {
        relations.push(ShareKind::SameBase);
    }
    if same(&p1.base_token_address, &p2.quote_token_address) {
        relations.push(ShareKind::BaseQuote);
    }
    if same(&p1.quote_token_address, &p2.base_token_address) {
        relations.push(ShareKind::QuoteBase);
    }
    relations
}

/// Comparable prices for both legs under `relation`
pub fn oriented_prices(leg1: &TradingPair, leg2: &TradingPair, relation: ShareKind) -> (f64, f64) {
    match relation {
        ShareKind::SameBase => (leg1.price_native, leg2.price_native),
        ShareKind::BaseQuote => (leg1.price_native, 1.0 / leg2.price_native),
        ShareKind::QuoteBase => (1.0 / leg1.price_native, leg2.price_native),
    }
}

/// Pool-side liquidity used for slippage: base-side when this leg's base
/// appears in the other leg, quote-side otherwise.
fn model_liquidity(leg: &TradingPair, other: &TradingPair) -> f64 {
    if other.holds(&leg.base_token_address) {
        leg.liquidity_base
    } else {
        leg.liquidity_quote
    }
}

/// Smaller of the two legs' liquidity on the side of the shared token
fn shared_side_liquidity(leg1: &TradingPair, leg2: &TradingPair, relation: ShareKind) -> f64 {
    match relation {
        ShareKind::SameBase => leg1.liquidity_base.min(leg2.liquidity_base),
        ShareKind::BaseQuote => leg1.liquidity_base.min(leg2.liquidity_quote),
        ShareKind::QuoteBase => leg1.liquidity_quote.min(leg2.liquidity_base),
    }
}

/// (entry, exit) tokens of the two-leg path.
/// An inverted price means the leg is traded from base to quote.
fn path_endpoints(leg1: &TradingPair, leg2: &TradingPair, relation: ShareKind) -> (String, String) {
    let entry = match relation {
        ShareKind::QuoteBase => &leg1.base_token_address,
        _ => &leg1.quote_token_address,
    };
    let exit = match relation {
        ShareKind::BaseQuote => &leg2.base_token_address,
        _ => &leg2.quote_token_address,
    };
    (entry.clone(), exit.clone())
}
