//! Candle-history Bollinger indicator.

use crate::domain::Candle;

use super::math::BollingerBands;
use super::HistoryIndicator;

/// Buys at or under the lower band of recent closes, sells back at the mean.
#[derive(Debug, Clone, Default)]
pub struct HistoryBollingerIndicator {
    bands: Option<BollingerBands>,
    buy_weight: f64,
    sell_weight: f64,
}

impl HistoryBollingerIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bands(&self) -> Option<BollingerBands> {
        self.bands
    }
}

impl HistoryIndicator for HistoryBollingerIndicator {
    fn analyze(&mut self, candles: &[Candle], last_price: f64) {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        self.bands = BollingerBands::from_samples(&closes);

        let (buy, sell) = match self.bands {
            Some(bands) => (last_price <= bands.lower, last_price >= bands.mean),
            None => (false, false),
        };
        self.buy_weight = if buy { 1.0 } else { 0.0 };
        self.sell_weight = if sell { 1.0 } else { 0.0 };
    }

    fn buy_weight(&self) -> f64 {
        self.buy_weight
    }

    fn sell_weight(&self) -> f64 {
        self.sell_weight
    }
}
