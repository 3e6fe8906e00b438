//! Cross-leg USD price discrepancies for a triangle
//!
//! For every token that appears in two legs, the percentage gap between its
//! USD price in the earlier leg and in the later one:
//!   (p_i - p_j) / p_i * 100
//! A token's USD price in a leg is `priceUsd` when it is the base token,
//! `priceUsd / priceNative` when it is the quote token.
//!
//! Author: AI-Generated
//! Created: 2026-10-18

use crate::types::{PriceDiscrepancies, TradingPair};

/// USD price of `token` as implied by `leg`
fn usd_price_in(leg: &TradingPair, token: &str) -> Option<f64> {
    if TradingPair::is_sentinel(token) {
        None
    } else if leg.base_token_address == token {
        Some(leg.price_usd)
    } else if leg.quote_token_address == token {
        Some(leg.quote_price_usd())
    } else {
        None
    }
}

fn percent_gap(reference: f64, other: f64) -> Option<f64> {
    if reference == 0.0 {
        None
    } else {
        Some((reference - other) / reference * 100.0)
    }
}

/// Slot for the leg pair (i, j), i < j: 12 -> 0, 13 -> 1, 23 -> 2
fn slot(i: usize, j: usize) -> usize {
    match (i.min(j), i.max(j)) {
        (0, 1) => 0,
        (0, 2) => 1,
        _ => 2,
    }
}

/// Base-token and quote-token gaps between each pair of legs.
/// The first comparison found for a slot wins; unmatched slots stay 0.
pub fn price_discrepancies(legs: [&TradingPair; 3]) -> PriceDiscrepancies {
    let mut base: [Option<f64>; 3] = [None; 3];
    let mut quote: [Option<f64>; 3] = [None; 3];

    for (i, leg) in legs.iter().enumerate() {
        for (j, other) in legs.iter().enumerate() {
            if i == j {
                continue;
            }
            let k = slot(i, j);

            if base[k].is_none() {
                if let Some(theirs) = usd_price_in(other, &leg.base_token_address) {
                    base[k] = percent_gap(leg.price_usd, theirs);
                }
            }
            if quote[k].is_none() {
                if let Some(theirs) = usd_price_in(other, &leg.quote_token_address) {
                    quote[k] = percent_gap(leg.quote_price_usd(), theirs);
                }
            }
        }
    }

    PriceDiscrepancies {
        base_12: base[0].unwrap_or(0.0),
        base_13: base[1].unwrap_or(0.0),
        base_23: base[2].unwrap_or(0.0),
        quote_12: quote[0].unwrap_or(0.0),
        quote_13: quote[1].unwrap_or(0.0),
        quote_23: quote[2].unwrap_or(0.0),
    }
}

/// Quote-token USD price of each leg
pub fn quote_prices_usd(legs: [&TradingPair; 3]) -> [f64; 3] {
    [legs[0].quote_price_usd(), legs[1].quote_price_usd(), legs[2].quote_price_usd()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::pair;

    #[test]
    fn test_shared_base_gap() {
        // X priced $2.00 on leg 1 and $2.10 on leg 2
        let mut l1 = pair("0x1", "0xx", "0xq1", 1.0, 50_000.0);
        l1.price_usd = 2.0;
        let mut l2 = pair("0x2", "0xx", "0xq2", 1.05, 60_000.0);
        l2.price_usd = 2.1;
        let l3 = pair("0x3", "0xq1", "0xq2", 1.0, 20_000.0);

        let d = price_discrepancies([&l1, &l2, &l3]);
        assert!((d.base_12 - (-5.0)).abs() < 1e-9);
        // X is absent from leg 3; the slot is filled by leg 3's base Q1 ($1) vs leg 1's implied Q1 ($2)
        assert!((d.base_13 - (-100.0)).abs() < 1e-9);
        // Leg 2 and leg 3 share Q2 only as quote tokens
        assert_eq!(d.base_23, 0.0);
    }

    #[test]
    fn test_quote_side_gap_uses_implied_price() {
        // Q1 is leg 1's quote ($2 / 1.0 = $2) and leg 3's base ($1.90)
        let mut l1 = pair("0x1", "0xx", "0xq1", 1.0, 50_000.0);
        l1.price_usd = 2.0;
        let l2 = pair("0x2", "0xx", "0xq2", 1.05, 60_000.0);
        let mut l3 = pair("0x3", "0xq1", "0xq2", 1.0, 20_000.0);
        l3.price_usd = 1.9;

        let d = price_discrepancies([&l1, &l2, &l3]);
        assert!((d.quote_13 - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_reference_price_leaves_slot_empty() {
        let mut l1 = pair("0x1", "0xx", "0xq1", 1.0, 50_000.0);
        l1.price_usd = 0.0;
        let l2 = pair("0x2", "0xx", "0xq2", 1.05, 60_000.0);
        let l3 = pair("0x3", "0xq1", "0xq2", 1.0, 20_000.0);

        let d = price_discrepancies([&l1, &l2, &l3]);
        // Leg 2's view of X fills the slot instead
        assert!((d.base_12 - (1.05 - 0.0) / 1.05 * 100.0).abs() < 1e-9);
    }
}
