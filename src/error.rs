//! Scanner error types
//!
//! Author: AI-Generated
//! Created: 2026-10-18

use thiserror::Error;

/// Failure reported by a quote provider for a single call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// HTTP 429 or equivalent; the gateway retries these
    #[error("rate limited by upstream")]
    RateLimited,

    /// Network failure, 5xx, or an unreadable body; never retried
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the scanner library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    #[error("upstream still rate limiting after {attempts} attempts")]
    UpstreamRateLimited { attempts: u32 },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A provider record had fields replaced by defaults. Logged, never returned.
    #[error("malformed record {pair_address}: defaulted {fields:?}")]
    MalformedRecord {
        pair_address: String,
        fields: Vec<&'static str>,
    },

    /// Zero (or non-positive) liquidity or price handed to the profit model
    #[error("profit model division by zero: leg {leg} {operand} is {value}")]
    DivisionByZeroInModel {
        leg: usize,
        operand: &'static str,
        value: f64,
    },

    #[error("contract store error: {0}")]
    Store(String),
}

pub type ScanResult<T> = std::result::Result<T, ScanError>;
