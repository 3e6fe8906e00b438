//! Opportunity Ranker
//!
//! Drops non-positive candidates, collapses triangles that share a canonical
//! key (first one wins), and orders the rest by normalized profit, highest
//! first. The sort is stable: equal profits keep discovery order.
//!
//! Author: AI-Generated
//! Created: 2026-10-18

use crate::types::{CanonicalKey, Opportunity};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::debug;

pub fn rank(candidates: Vec<Opportunity>) -> Vec<Opportunity> {
    let total = candidates.len();
    let mut seen: HashSet<CanonicalKey> = HashSet::new();

    let mut ranked: Vec<Opportunity> = candidates
        .into_iter()
        .filter(|opp| opp.normalized_profit() > Decimal::ZERO)
        .filter(|opp| match opp.canonical_key() {
            Some(key) => seen.insert(key.clone()),
            None => true,
        })
        .collect();

    ranked.sort_by(|a, b| b.normalized_profit().cmp(&a.normalized_profit()));

    debug!("Ranked {} of {} candidates", ranked.len(), total);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::matcher::{PairMatcher, Slippage, TradeParams};
    use crate::types::fixtures::pair;
    use crate::types::{ArbitrageOpportunity, PriceDiscrepancies, TriangularOpportunity};
    use rust_decimal_macros::dec;

    fn candidate(tag: &str, profit: Decimal) -> ArbitrageOpportunity {
        let a = pair(&format!("0x{}a", tag), "0xx", "0xq1", 1.00, 50_000.0);
        let b = pair(&format!("0x{}b", tag), "0xx", "0xq2", 1.05, 60_000.0);
        let params = TradeParams {
            investment: 1000.0,
            slippage: Slippage::uniform(0.01),
            fee_rate: 0.003,
        };
        let mut opp = PairMatcher::new(params).find_two_leg(&[a, b]).unwrap().remove(0);
        opp.normalized_profit = profit;
        opp
    }

    fn triangle(tag: &str, profit: Decimal) -> Opportunity {
        let two_leg = candidate(tag, profit);
        let leg3 = pair(&format!("0x{}c", tag), "0xq2", "0xq1", 1.0, 80_000.0);
        let canonical_key = CanonicalKey::from_legs(&[&two_leg.leg1, &two_leg.leg2, &leg3]);
        Opportunity::Triangular(TriangularOpportunity {
            two_leg,
            leg3,
            price3: 1.0,
            cycle_profit: 1.0,
            canonical_key,
            quote_prices_usd: [1.0; 3],
            discrepancies: PriceDiscrepancies::default(),
        })
    }

    #[test]
    fn test_orders_by_profit_descending() {
        let ranked = rank(vec![
            Opportunity::TwoLeg(candidate("a", dec!(1.5))),
            Opportunity::TwoLeg(candidate("b", dec!(12.25))),
            Opportunity::TwoLeg(candidate("c", dec!(3))),
        ]);

        let profits: Vec<Decimal> = ranked.iter().map(|o| o.normalized_profit()).collect();
        assert_eq!(profits, vec![dec!(12.25), dec!(3), dec!(1.5)]);
    }

    #[test]
    fn test_drops_non_positive() {
        let ranked = rank(vec![
            Opportunity::TwoLeg(candidate("a", Decimal::ZERO)),
            Opportunity::TwoLeg(candidate("b", dec!(-0.5))),
            Opportunity::TwoLeg(candidate("c", dec!(0.00000001))),
        ]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].two_leg().leg1.pair_address, "0xca");
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let ranked = rank(vec![
            Opportunity::TwoLeg(candidate("first", dec!(2))),
            Opportunity::TwoLeg(candidate("second", dec!(2))),
        ]);
        assert_eq!(ranked[0].two_leg().leg1.pair_address, "0xfirsta");
        assert_eq!(ranked[1].two_leg().leg1.pair_address, "0xseconda");
    }

    #[test]
    fn test_same_canonical_key_collapses() {
        // Same six tokens, different pool addresses
        let ranked = rank(vec![triangle("a", dec!(2)), triangle("b", dec!(5))]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].normalized_profit(), dec!(2));
    }
}
