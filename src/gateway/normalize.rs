//! Record Normalization
//!
//! Turns a raw provider record into a `TradingPair`. Missing or unreadable
//! numeric fields become 0.0, missing identifiers become the sentinel.
//! Numbers are accepted either as JSON numbers or as numeric strings.
//!
//! Author: AI-Generated
//! Created: 2026-10-18

use crate::error::ScanError;
use crate::types::{TradingPair, SENTINEL};
use serde_json::Value;
use tracing::warn;

fn lookup<'a>(record: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(record, |value, key| value.get(*key))
}

fn text(record: &Value, path: &[&str]) -> Option<String> {
    match lookup(record, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn number(record: &Value, path: &[&str]) -> Option<f64> {
    let parsed = match lookup(record, path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Normalize one record, returning the pair and the names of defaulted fields
pub fn normalize_record(record: &Value) -> (TradingPair, Vec<&'static str>) {
    let mut defaulted = Vec::new();

    let mut text_field = |name: &'static str, path: &[&str]| {
        text(record, path).unwrap_or_else(|| {
            defaulted.push(name);
            SENTINEL.to_string()
        })
    };

    let pair_address = text_field("pairAddress", &["pairAddress"]);
    let chain_id = text_field("chainId", &["chainId"]);
    let dex_id = text_field("dexId", &["dexId"]);
    let base_token_address = text_field("baseToken.address", &["baseToken", "address"]);
    let base_token_name = text_field("baseToken.name", &["baseToken", "name"]);
    let quote_token_address = text_field("quoteToken.address", &["quoteToken", "address"]);
    let quote_token_name = text_field("quoteToken.name", &["quoteToken", "name"]);
    let url = text_field("url", &["url"]);

    let mut number_field = |name: &'static str, path: &[&str]| {
        number(record, path).unwrap_or_else(|| {
            defaulted.push(name);
            0.0
        })
    };

    let price_native = number_field("priceNative", &["priceNative"]);
    let price_usd = number_field("priceUsd", &["priceUsd"]);
    let liquidity_usd = number_field("liquidity.usd", &["liquidity", "usd"]);
    let liquidity_base = number_field("liquidity.base", &["liquidity", "base"]);
    let liquidity_quote = number_field("liquidity.quote", &["liquidity", "quote"]);

    let pair = TradingPair {
        pair_address,
        chain_id,
        dex_id,
        base_token_address,
        base_token_name,
        quote_token_address,
        quote_token_name,
        price_native,
        price_usd,
        liquidity_usd,
        liquidity_base,
        liquidity_quote,
        url,
    };

    (pair, defaulted)
}

/// Normalize a batch. Defaulted fields are logged, never fatal.
pub fn normalize_records(records: &[Value]) -> Vec<TradingPair> {
    records
        .iter()
        .map(|record| {
            let (pair, defaulted) = normalize_record(record);
            if !defaulted.is_empty() {
                let err = ScanError::MalformedRecord {
                    pair_address: pair.pair_address.clone(),
                    fields: defaulted,
                };
                warn!("{}", err);
            }
            pair
        })
        .collect()
}
