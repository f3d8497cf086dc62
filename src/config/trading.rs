//! Strategy and state machine settings.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::Currency;
use crate::strategy::StrategyKind;
use crate::trading::{ExecutionMode, ExecutorSettings};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub mode: ExecutionMode,
    pub strategy: StrategyKind,
    /// Live candidates must have this base currency. Empty allows any.
    pub base_currency: String,
    /// Seconds of scheduler cadence an order is watched before canceling.
    pub retry_period_secs: u32,
    /// Wait for balances to propagate after a round-trip.
    pub settle_delay_ms: u64,
    /// Overrides the strategy's priming sample count.
    pub prime_samples: Option<usize>,
    pub restart_base_ms: u64,
    pub restart_max_ms: u64,
}

impl TradingConfig {
    #[must_use]
    pub fn base_currency(&self) -> Option<Currency> {
        let trimmed = self.base_currency.trim();
        (!trimmed.is_empty()).then(|| Currency::new(trimmed))
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            base_currency: self.base_currency(),
            prime_samples: self.prime_samples,
            restart_base: Duration::from_millis(self.restart_base_ms),
            restart_max: Duration::from_millis(self.restart_max_ms),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            strategy: StrategyKind::Reaction,
            base_currency: "BTC".into(),
            retry_period_secs: 2,
            settle_delay_ms: 2_000,
            prime_samples: None,
            restart_base_ms: 1_000,
            restart_max_ms: 60_000,
        }
    }
}
