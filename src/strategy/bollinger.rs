//! Live Bollinger-band indicator over last prices.

use crate::domain::Ticker;

use super::math::SampleWindow;
use super::TickerIndicator;

const MIN_BASE_VOLUME: f64 = 50.0;
const STOP_LOSS_RATIO: f64 = 0.995;
/// The short-period average covers the newest `1 / RECENT_FRACTION` of the window.
const RECENT_FRACTION: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    between_average_and_mid_upper: bool,
    above_upper_band: bool,
    above_min_volume: bool,
}

impl Flags {
    fn buy(self) -> bool {
        self.above_min_volume && self.between_average_and_mid_upper
    }

    fn sell(self) -> bool {
        self.above_upper_band
    }
}

/// Buys a pair climbing from its short-term average toward the upper band,
/// sells on a break above the band or on a 0.5% stop loss.
#[derive(Debug, Clone)]
pub struct BollingerIndicator {
    window: SampleWindow,
    ticker: Option<Ticker>,
    flags: Flags,
}

impl BollingerIndicator {
    pub fn new(window_size: usize) -> Self {
        Self {
            window: SampleWindow::new(window_size),
            ticker: None,
            flags: Flags::default(),
        }
    }
}

impl TickerIndicator for BollingerIndicator {
    fn add_sample(&mut self, ticker: Ticker) {
        let last = ticker.last;
        self.window.push(last);

        if let Some(bands) = self.window.bands() {
            let recent = self
                .window
                .recent_mean(self.window.capacity() / RECENT_FRACTION);
            let mid_upper = (recent + bands.upper) / 2.0;

            self.flags.between_average_and_mid_upper = recent <= last && last <= mid_upper;
            self.flags.above_upper_band = bands.upper <= last;
        }
        self.flags.above_min_volume = ticker.base_volume >= MIN_BASE_VOLUME;
        self.ticker = Some(ticker);
    }

    fn ticker(&self) -> Option<&Ticker> {
        self.ticker.as_ref()
    }

    fn should_buy(&self) -> bool {
        self.flags.buy()
    }

    fn should_sell(&self, buy_price: f64, fee: f64) -> bool {
        let Some(ticker) = &self.ticker else {
            return false;
        };
        let last = ticker.last;
        let net_gain = last * (1.0 - fee) - buy_price;
        last <= STOP_LOSS_RATIO * buy_price || (self.flags.sell() && net_gain > 0.0)
    }

    fn candidacy_weight(&self) -> f64 {
        [
            self.window.average_to_oldest_ratio(),
            self.window.newest_to_oldest_ratio(),
            self.window.newest_to_average_ratio(),
        ]
        .into_iter()
        .filter(|ratio| *ratio >= 1.0)
        .sum()
    }

    fn sample_count(&self) -> usize {
        self.window.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::CurrencyPair;

    use super::*;

    fn tick(last: f64, volume: f64) -> Ticker {
        Ticker::new(CurrencyPair::new("BTC", "ETH"), last).with_volume(volume, 0.0)
    }

    #[test]
    fn test_buy_needs_volume() {
        let mut quiet = BollingerIndicator::new(8);
        let mut busy = BollingerIndicator::new(8);
        for price in [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.1, 1.1] {
            quiet.add_sample(tick(price, 10.0));
            busy.add_sample(tick(price, 60.0));
        }
        assert!(!quiet.should_buy());
        assert!(busy.should_buy());
    }

    #[test]
    fn test_no_buy_below_recent_average() {
        let mut indicator = BollingerIndicator::new(8);
        for price in [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.2, 1.0] {
            indicator.add_sample(tick(price, 100.0));
        }
        assert!(!indicator.should_buy());
    }

    #[test]
    fn test_stop_loss_sells_regardless_of_band() {
        let mut indicator = BollingerIndicator::new(4);
        indicator.add_sample(tick(0.99, 100.0));
        assert!(indicator.should_sell(1.0, 0.0));
        assert!(!BollingerIndicator::new(4).should_sell(1.0, 0.0));
    }

    #[test]
    fn test_sell_on_upper_band_break_only_in_profit() {
        let mut indicator = BollingerIndicator::new(8);
        for price in [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0] {
            indicator.add_sample(tick(price, 100.0));
        }
        assert!(indicator.should_sell(1.5, 0.0025));
        assert!(!indicator.should_sell(1.999, 0.0025));
    }

    #[test]
    fn test_weight_sums_rising_ratios() {
        let mut indicator = BollingerIndicator::new(4);
        for price in [1.0, 2.0, 3.0, 4.0] {
            indicator.add_sample(tick(price, 100.0));
        }
        // mean 2.5: 2.5/1 + 4/1 + 4/2.5
        assert!((indicator.candidacy_weight() - 8.1).abs() < 1e-9);

        let mut falling = BollingerIndicator::new(4);
        for price in [4.0, 3.0, 2.0, 1.0] {
            falling.add_sample(tick(price, 100.0));
        }
        assert_eq!(falling.candidacy_weight(), 0.0);
    }
}
