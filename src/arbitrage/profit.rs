//! Profit Model
//!
//! Slippage- and fee-adjusted profit for a chain of legs.
//!
//! Slippage is linear in trade size relative to pool liquidity:
//!   adjusted = amount * (1 - slippage * amount / liquidity)
//! This is not a constant-product curve. Fees are a flat
//! `fee_rate * investment` per leg.
//!
//! Author: AI-Generated
//! Created: 2026-01-27
//! Modified: 2026-10-18 - Linear slippage model, N-leg chains

use crate::error::{ScanError, ScanResult};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept by `normalize_profit`
pub const PROFIT_PRECISION: u32 = 8;

/// One leg of a trade chain as seen by the model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegQuote {
    pub price: f64,
    pub liquidity: f64,
    pub slippage: f64,
}

impl LegQuote {
    pub fn new(price: f64, liquidity: f64, slippage: f64) -> Self {
        Self { price, liquidity, slippage }
    }
}

/// Apply the linear slippage model to `amount` traded against `liquidity`.
/// `leg` is 1-based and only used for error reporting.
pub fn apply_slippage(amount: f64, liquidity: f64, slippage: f64, leg: usize) -> ScanResult<f64> {
    if !(liquidity > 0.0) {
        return Err(ScanError::DivisionByZeroInModel { leg, operand: "liquidity", value: liquidity });
    }
    Ok(amount * (1.0 - slippage * (amount / liquidity)))
}

/// Profit of converting `investment` through every leg in order.
///
/// Leg 1 buys (`investment / price`), later legs sell (`amount * price`).
/// Each leg pays slippage against its own liquidity; fees are charged once per leg.
pub fn chain_profit(investment: f64, legs: &[LegQuote], fee_rate: f64) -> ScanResult<f64> {
    let first = match legs.first() {
        Some(leg) => leg,
        None => return Ok(-investment),
    };

    if !(first.price > 0.0) {
        return Err(ScanError::DivisionByZeroInModel { leg: 1, operand: "price", value: first.price });
    }

    let mut amount = apply_slippage(investment / first.price, first.liquidity, first.slippage, 1)?;
    for (idx, leg) in legs.iter().enumerate().skip(1) {
        amount = apply_slippage(amount * leg.price, leg.liquidity, leg.slippage, idx + 1)?;
    }

    let fees = investment * fee_rate * legs.len() as f64;
    Ok(amount - investment - fees)
}

/// Two-leg profit: buy at `price1` on leg 1, sell at `price2` on leg 2.
#[allow(clippy::too_many_arguments)]
pub fn two_leg_profit(
    investment: f64,
    price1: f64,
    price2: f64,
    slippage1: f64,
    slippage2: f64,
    fee_rate: f64,
    liquidity1: f64,
    liquidity2: f64,
) -> ScanResult<f64> {
    chain_profit(
        investment,
        &[
            LegQuote::new(price1, liquidity1, slippage1),
            LegQuote::new(price2, liquidity2, slippage2),
        ],
        fee_rate,
    )
}

/// Three-leg profit: the two-leg chain continued through a closing leg.
/// The closing leg pays the second leg's slippage rate.
#[allow(clippy::too_many_arguments)]
pub fn three_leg_profit(
    investment: f64,
    price1: f64,
    price2: f64,
    price3: f64,
    slippage1: f64,
    slippage2: f64,
    fee_rate: f64,
    liquidity1: f64,
    liquidity2: f64,
    liquidity3: f64,
) -> ScanResult<f64> {
    chain_profit(
        investment,
        &[
            LegQuote::new(price1, liquidity1, slippage1),
            LegQuote::new(price2, liquidity2, slippage2),
            LegQuote::new(price3, liquidity3, slippage2),
        ],
        fee_rate,
    )
}

/// Truncate toward zero at 8 decimal places. Non-finite profits normalize to zero.
pub fn normalize_profit(profit: f64) -> Decimal {
    Decimal::from_f64(profit)
        .map(|d| d.round_dp_with_strategy(PROFIT_PRECISION, RoundingStrategy::ToZero))
        .unwrap_or(Decimal::ZERO)
}
