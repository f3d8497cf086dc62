//! Live momentum indicator built on a linear regression of recent prices.

use chrono::{DateTime, Utc};

use crate::domain::Ticker;

use super::math::LinearRegression;
use super::TickerIndicator;

const MIN_BASE_VOLUME: f64 = 540.0;
const STOP_LOSS_RATIO: f64 = 0.995;
const MIN_NET_GAIN_RATIO: f64 = 0.0005;

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    positive_regression: bool,
    over_min_weight: bool,
    above_min_volume: bool,
}

/// Fits `(elapsed ms, last price)` over the window and buys while the
/// normalized slope is positive on a liquid pair.
///
/// The x axis is measured from the first sample's timestamp, so identical
/// sample sequences always produce identical signals.
#[derive(Debug, Clone)]
pub struct ReactionIndicator {
    regression: LinearRegression,
    origin: Option<DateTime<Utc>>,
    ticker: Option<Ticker>,
    weight: f64,
    flags: Flags,
}

impl ReactionIndicator {
    pub fn new(window_size: usize) -> Self {
        Self {
            regression: LinearRegression::new(window_size),
            origin: None,
            ticker: None,
            weight: 0.0,
            flags: Flags::default(),
        }
    }
}

impl TickerIndicator for ReactionIndicator {
    fn add_sample(&mut self, ticker: Ticker) {
        let origin = *self.origin.get_or_insert(ticker.timestamp);
        let elapsed_ms = (ticker.timestamp - origin).num_milliseconds() as f64;
        self.regression.push(elapsed_ms, ticker.last);

        let newest = self.regression.newest_y().unwrap_or(0.0);
        let normalized = self.regression.slope() / newest;
        self.weight = if normalized.is_finite() { normalized } else { 0.0 };

        self.flags.positive_regression = normalized > 0.0;
        self.flags.over_min_weight = self.weight > 0.0;
        self.flags.above_min_volume = ticker.base_volume >= MIN_BASE_VOLUME;
        self.ticker = Some(ticker);
    }

    fn ticker(&self) -> Option<&Ticker> {
        self.ticker.as_ref()
    }

    fn should_buy(&self) -> bool {
        self.flags.positive_regression && self.flags.over_min_weight && self.flags.above_min_volume
    }

    fn should_sell(&self, buy_price: f64, fee: f64) -> bool {
        let Some(ticker) = &self.ticker else {
            return false;
        };
        let last = ticker.last;
        let net_gain_ratio = (last * (1.0 - fee) - buy_price) / buy_price;
        last < STOP_LOSS_RATIO * buy_price || net_gain_ratio > MIN_NET_GAIN_RATIO
    }

    fn candidacy_weight(&self) -> f64 {
        self.weight
    }

    fn sample_count(&self) -> usize {
        self.regression.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use crate::domain::CurrencyPair;

    use super::*;

    fn tick(second: i64, last: f64) -> Ticker {
        let start = Utc.timestamp_opt(1_500_000_000, 0).unwrap();
        Ticker::new(CurrencyPair::new("BTC", "ETH"), last)
            .with_volume(1_000.0, 0.0)
            .at(start + Duration::seconds(second))
    }

    #[test]
    fn test_rising_prices_buy() {
        let mut indicator = ReactionIndicator::new(45);
        for i in 0..100 {
            indicator.add_sample(tick(i, (i * i) as f64));
        }
        assert!(indicator.should_buy());
        assert!(indicator.candidacy_weight() > 0.0);
    }

    #[test]
    fn test_falling_prices_sell_and_do_not_buy() {
        let mut indicator = ReactionIndicator::new(45);
        for i in 0..100 {
            indicator.add_sample(tick(i, (100 - i) as f64));
        }
        assert!(!indicator.should_buy());
        assert!(indicator.should_sell(100.0, 0.0));
    }

    #[test]
    fn test_low_volume_blocks_buy() {
        let mut indicator = ReactionIndicator::new(10);
        for i in 0..10 {
            let t = tick(i, 1.0 + i as f64).with_volume(100.0, 0.0);
            indicator.add_sample(t);
        }
        assert!(!indicator.should_buy());
    }

    #[test]
    fn test_sell_on_small_net_gain() {
        let mut indicator = ReactionIndicator::new(10);
        indicator.add_sample(tick(0, 1.01));
        assert!(indicator.should_sell(1.0, 0.0025));
        assert!(!indicator.should_sell(1.01, 0.0));
    }
}
