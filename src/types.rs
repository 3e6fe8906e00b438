//! Core data structures
//!
//! Trading pairs as quoted by the upstream provider, the cached per-pair
//! state used for staleness checks, and the two-leg / triangular
//! opportunities derived from them.
//!
//! Author: AI-Generated
//! Created: 2026-01-27
//! Modified: 2026-10-18 - Reworked around provider-quoted pairs and triangular cycles

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Placeholder substituted for identifier fields missing from a provider record.
/// Never treated as a real token address when matching.
pub const SENTINEL: &str = "N/A";

/// Both legs of a candidate must carry strictly more USD liquidity than this
pub const MIN_LIQUIDITY_USD: f64 = 10_000.0;

/// A quoted market for a base/quote token on one chain and exchange.
///
/// Built fresh from every provider response and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingPair {
    pub pair_address: String,
    pub chain_id: String,
    pub dex_id: String,
    pub base_token_address: String,
    pub base_token_name: String,
    pub quote_token_address: String,
    pub quote_token_name: String,
    /// Price of the base token in quote-token units
    pub price_native: f64,
    pub price_usd: f64,
    pub liquidity_usd: f64,
    pub liquidity_base: f64,
    pub liquidity_quote: f64,
    pub url: String,
}

impl TradingPair {
    /// True if the value is the placeholder used for missing identifiers
    pub fn is_sentinel(value: &str) -> bool {
        value == SENTINEL || value.is_empty()
    }

    /// "BASE/QUOTE" display symbol
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base_token_name, self.quote_token_name)
    }

    /// A pair can take part in matching only with a real address and a positive price
    pub fn is_eligible(&self) -> bool {
        !Self::is_sentinel(&self.pair_address)
            && self.price_native > 0.0
            && self.price_native.is_finite()
            && self.liquidity_usd >= 0.0
    }

    /// Whether `token` is one side of this market (sentinels never match)
    pub fn holds(&self, token: &str) -> bool {
        !Self::is_sentinel(token) && (self.base_token_address == token || self.quote_token_address == token)
    }

    /// True if this market trades exactly the two given tokens, in either order
    pub fn connects(&self, a: &str, b: &str) -> bool {
        if Self::is_sentinel(a) || Self::is_sentinel(b) {
            return false;
        }
        (self.base_token_address == a && self.quote_token_address == b)
            || (self.base_token_address == b && self.quote_token_address == a)
    }

    /// Quote token USD price implied by the pair (`priceUsd / priceNative`)
    pub fn quote_price_usd(&self) -> f64 {
        if self.price_native == 0.0 {
            0.0
        } else {
            self.price_usd / self.price_native
        }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} on {}/{} ({})", self.symbol(), self.chain_id, self.dex_id, self.pair_address)
    }
}

/// Last-known state for one pair address, owned by the contract cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCacheEntry {
    pub pair_address: String,
    pub base_token_address: String,
    pub quote_token_address: String,
    pub chain_id: String,
    pub dex_id: String,
    pub price_native: f64,
    pub last_updated: DateTime<Utc>,
    /// Full quote recorded with the entry; lets fresh entries close triangles without a provider call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<TradingPair>,
}

impl ContractCacheEntry {
    pub fn from_pair(pair: &TradingPair, now: DateTime<Utc>) -> Self {
        Self {
            pair_address: pair.pair_address.clone(),
            base_token_address: pair.base_token_address.clone(),
            quote_token_address: pair.quote_token_address.clone(),
            chain_id: pair.chain_id.clone(),
            dex_id: pair.dex_id.clone(),
            price_native: pair.price_native,
            last_updated: now,
            pair: Some(pair.clone()),
        }
    }

    pub fn connects(&self, a: &str, b: &str) -> bool {
        if TradingPair::is_sentinel(a) || TradingPair::is_sentinel(b) {
            return false;
        }
        (self.base_token_address == a && self.quote_token_address == b)
            || (self.base_token_address == b && self.quote_token_address == a)
    }
}

/// Which token the two legs of a candidate share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareKind {
    /// Same base token on both legs
    SameBase,
    /// Leg 1's base is leg 2's quote
    BaseQuote,
    /// Leg 1's quote is leg 2's base
    QuoteBase,
}

impl ShareKind {
    /// The relation seen from the other leg's point of view
    pub fn mirrored(self) -> Self {
        match self {
            ShareKind::SameBase => ShareKind::SameBase,
            ShareKind::BaseQuote => ShareKind::QuoteBase,
            ShareKind::QuoteBase => ShareKind::BaseQuote,
        }
    }
}

impl fmt::Display for ShareKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ShareKind::SameBase => write!(f, "base-base"),
            ShareKind::BaseQuote => write!(f, "base-quote"),
            ShareKind::QuoteBase => write!(f, "quote-base"),
        }
    }
}

/// Two-leg candidate: buy on `leg1`, sell on `leg2`.
///
/// Legs are snapshots; everything else is derived from them plus the scan
/// parameters, so re-running the profit model on the legs reproduces `profit`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageOpportunity {
    pub leg1: TradingPair,
    pub leg2: TradingPair,
    pub relation: ShareKind,
    /// Leg prices as fed to the profit model (inverted where a quote is compared to a base)
    pub price1: f64,
    pub price2: f64,
    /// Pool-side liquidity fed to the profit model for each leg
    pub model_liquidity1: f64,
    pub model_liquidity2: f64,
    pub price_diff: f64,
    pub liquidity_diff: f64,
    pub base_liquidity: f64,
    pub profit: f64,
    /// `profit` truncated to 8 decimal places; the ranking key
    pub normalized_profit: Decimal,
    /// `base_liquidity * price_diff`, an upper-bound heuristic
    pub potential_profit: f64,
    pub native_price_ratio: f64,
    /// Token the investment is denominated in
    pub entry_token: String,
    /// Token held after the second leg
    pub exit_token: String,
}

impl ArbitrageOpportunity {
    /// The four token addresses across both legs, in leg order
    pub fn token_addresses(&self) -> [&str; 4] {
        [
            &self.leg1.base_token_address,
            &self.leg1.quote_token_address,
            &self.leg2.base_token_address,
            &self.leg2.quote_token_address,
        ]
    }
}

/// Deduplication key: the six token addresses of a triangle, sorted
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(Vec<String>);

impl CanonicalKey {
    pub fn from_legs(legs: &[&TradingPair]) -> Self {
        let mut tokens: Vec<String> = legs
            .iter()
            .flat_map(|leg| [leg.base_token_address.clone(), leg.quote_token_address.clone()])
            .collect();
        tokens.sort();
        Self(tokens)
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.join("|"))
    }
}

/// Percentage gaps between a token's USD price in one leg and in another.
/// Zero where the token does not recur between the two legs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PriceDiscrepancies {
    pub base_12: f64,
    pub base_13: f64,
    pub base_23: f64,
    pub quote_12: f64,
    pub quote_13: f64,
    pub quote_23: f64,
}

/// Two-leg candidate closed back to its entry token by a third market
#[derive(Debug, Clone, PartialEq)]
pub struct TriangularOpportunity {
    pub two_leg: ArbitrageOpportunity,
    pub leg3: TradingPair,
    /// Third-leg conversion rate oriented from the exit token back to the entry token
    pub price3: f64,
    /// Three-leg profit estimate; a filter, not an authoritative figure
    pub cycle_profit: f64,
    pub canonical_key: CanonicalKey,
    pub quote_prices_usd: [f64; 3],
    pub discrepancies: PriceDiscrepancies,
}

/// Anything the ranker can surface
#[derive(Debug, Clone, PartialEq)]
pub enum Opportunity {
    TwoLeg(ArbitrageOpportunity),
    Triangular(TriangularOpportunity),
}

impl Opportunity {
    pub fn normalized_profit(&self) -> Decimal {
        self.two_leg().normalized_profit
    }

    pub fn two_leg(&self) -> &ArbitrageOpportunity {
        match self {
            Opportunity::TwoLeg(opp) => opp,
            Opportunity::Triangular(tri) => &tri.two_leg,
        }
    }

    pub fn canonical_key(&self) -> Option<&CanonicalKey> {
        match self {
            Opportunity::TwoLeg(_) => None,
            Opportunity::Triangular(tri) => Some(&tri.canonical_key),
        }
    }

    pub fn third_leg(&self) -> Option<&TradingPair> {
        match self {
            Opportunity::TwoLeg(_) => None,
            Opportunity::Triangular(tri) => Some(&tri.leg3),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Opportunity::TwoLeg(_) => "two_leg",
            Opportunity::Triangular(_) => "triangular",
        }
    }

    /// Flat view handed to callers for rendering
    pub fn record(&self) -> OpportunityRecord<'_> {
        OpportunityRecord(self)
    }
}

/// Serializes an opportunity as one flat map: `pair1_*`, `pair2_*`,
/// optional `pair3_*`, then the computed fields.
pub struct OpportunityRecord<'a>(&'a Opportunity);

fn serialize_leg<M: SerializeMap>(map: &mut M, prefix: &str, leg: &TradingPair) -> Result<(), M::Error> {
    map.serialize_entry(&format!("{}_pairAddress", prefix), &leg.pair_address)?;
    map.serialize_entry(&format!("{}_chainId", prefix), &leg.chain_id)?;
    map.serialize_entry(&format!("{}_dexId", prefix), &leg.dex_id)?;
    map.serialize_entry(&format!("{}_baseTokenName", prefix), &leg.base_token_name)?;
    map.serialize_entry(&format!("{}_baseTokenAddress", prefix), &leg.base_token_address)?;
    map.serialize_entry(&format!("{}_quoteTokenName", prefix), &leg.quote_token_name)?;
    map.serialize_entry(&format!("{}_quoteTokenAddress", prefix), &leg.quote_token_address)?;
    map.serialize_entry(&format!("{}_priceNative", prefix), &leg.price_native)?;
    map.serialize_entry(&format!("{}_priceUsd", prefix), &leg.price_usd)?;
    map.serialize_entry(&format!("{}_liquidityUsd", prefix), &leg.liquidity_usd)?;
    map.serialize_entry(&format!("{}_liquidityBase", prefix), &leg.liquidity_base)?;
    map.serialize_entry(&format!("{}_liquidityQuote", prefix), &leg.liquidity_quote)?;
    map.serialize_entry(&format!("{}_url", prefix), &leg.url)?;
    Ok(())
}

impl Serialize for OpportunityRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let opp = self.0;
        let two_leg = opp.two_leg();
        let mut map = serializer.serialize_map(None)?;

        map.serialize_entry("kind", opp.kind())?;
        serialize_leg(&mut map, "pair1", &two_leg.leg1)?;
        serialize_leg(&mut map, "pair2", &two_leg.leg2)?;
        if let Opportunity::Triangular(tri) = opp {
            serialize_leg(&mut map, "pair3", &tri.leg3)?;
        }

        map.serialize_entry("relation", &two_leg.relation)?;
        map.serialize_entry("priceDiff", &two_leg.price_diff)?;
        map.serialize_entry("liquidityDiff", &two_leg.liquidity_diff)?;
        map.serialize_entry("baseLiquidity", &two_leg.base_liquidity)?;
        map.serialize_entry("profit", &two_leg.profit)?;
        map.serialize_entry("normalizedProfit", &two_leg.normalized_profit)?;
        map.serialize_entry("potentialProfit", &two_leg.potential_profit)?;
        map.serialize_entry("nativePriceRatio", &two_leg.native_price_ratio)?;
        map.serialize_entry("entryToken", &two_leg.entry_token)?;
        map.serialize_entry("exitToken", &two_leg.exit_token)?;

        if let Opportunity::Triangular(tri) = opp {
            map.serialize_entry("cycleProfit", &tri.cycle_profit)?;
            map.serialize_entry("canonicalKey", &tri.canonical_key.to_string())?;
            map.serialize_entry("quotePriceUsd1", &tri.quote_prices_usd[0])?;
            map.serialize_entry("quotePriceUsd2", &tri.quote_prices_usd[1])?;
            map.serialize_entry("quotePriceUsd3", &tri.quote_prices_usd[2])?;
            map.serialize_entry("baseTokenDifference12", &tri.discrepancies.base_12)?;
            map.serialize_entry("baseTokenDifference13", &tri.discrepancies.base_13)?;
            map.serialize_entry("baseTokenDifference23", &tri.discrepancies.base_23)?;
            map.serialize_entry("quoteTokenDifference12", &tri.discrepancies.quote_12)?;
            map.serialize_entry("quoteTokenDifference13", &tri.discrepancies.quote_13)?;
            map.serialize_entry("quoteTokenDifference23", &tri.discrepancies.quote_23)?;
        }

        map.end()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::TradingPair;

    /// Pair with every field populated; liquidity split evenly across both sides
    pub fn pair(address: &str, base: &str, quote: &str, price_native: f64, liquidity_usd: f64) -> TradingPair {
        TradingPair {
            pair_address: address.to_string(),
            chain_id: "ethereum".to_string(),
            dex_id: "uniswap".to_string(),
            base_token_address: base.to_string(),
            base_token_name: base.to_uppercase(),
            quote_token_address: quote.to_string(),
            quote_token_name: quote.to_uppercase(),
            price_native,
            price_usd: price_native,
            liquidity_usd,
            liquidity_base: liquidity_usd / 2.0,
            liquidity_quote: liquidity_usd / 2.0,
            url: format!("https://dexscreener.com/ethereum/{}", address),
        }
    }
}
