//! Builders for domain primitives used across tests.
//!
//! Concise factory functions for pairs, tickers, candles and balances so
//! tests focus on assertions rather than construction boilerplate.

use crate::domain::{Balances, Candle, CurrencyPair, Ticker, Tickers};

/// Volume high enough to clear every strategy's liquidity threshold.
pub const LIQUID_VOLUME: f64 = 1_000.0;

/// Parse a `BASE_QUOTE` pair. Panics on malformed input.
pub fn pair(raw: &str) -> CurrencyPair {
    raw.parse().unwrap_or_else(|e| panic!("bad test pair {raw}: {e}"))
}

/// A liquid ticker for `raw` at `last`.
pub fn ticker(raw: &str, last: f64) -> Ticker {
    Ticker::new(pair(raw), last).with_volume(LIQUID_VOLUME, LIQUID_VOLUME / last)
}

/// One poll's worth of liquid tickers.
pub fn tickers(prices: &[(&str, f64)]) -> Tickers {
    prices
        .iter()
        .map(|&(raw, last)| (pair(raw), ticker(raw, last)))
        .collect()
}

/// `n` flat candles at `price`, `period` seconds apart from `start`.
pub fn flat_candles(n: usize, start: i64, period: i64, price: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| Candle::flat(start + period * i as i64, price))
        .collect()
}

/// Candles whose closes are `closes`, one per `period` seconds.
pub fn candles_closing_at(closes: &[f64], start: i64, period: i64) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle::flat(start + period * i as i64, close))
        .collect()
}

pub fn balances(amounts: &[(&str, f64)]) -> Balances {
    amounts
        .iter()
        .fold(Balances::new(), |b, &(currency, amount)| b.with(currency, amount))
}
