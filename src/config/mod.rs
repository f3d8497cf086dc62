//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file with environment variable
//! overrides for exchange credentials (`COIN_TRADER_API_KEY`,
//! `COIN_TRADER_API_SECRET`). Every table is optional.

use std::path::Path;

use serde::Deserialize;

use crate::domain::{Balances, CurrencyPair};
use crate::error::{ConfigError, Result};

mod exchange;
mod logging;
mod simulation;
mod trading;

pub use exchange::{ExchangeConfig, API_KEY_ENV, API_SECRET_ENV};
pub use logging::LoggingConfig;
pub use simulation::SimulationConfig;
pub use trading::TradingConfig;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let mut config = Self::parse(&content)?;
        config.exchange.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse without environment overrides or validation.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content).map_err(ConfigError::Parse)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.exchange.name.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "exchange.name" }.into());
        }
        if self.exchange.requests_per_second == 0 {
            return Err(invalid("exchange.requests_per_second", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.exchange.fee) {
            return Err(invalid(
                "exchange.fee",
                format!("{} is not in [0, 1)", self.exchange.fee),
            ));
        }
        if self.trading.retry_period_secs == 0 {
            return Err(invalid("trading.retry_period_secs", "must be positive"));
        }
        if self.trading.restart_base_ms > self.trading.restart_max_ms {
            return Err(invalid(
                "trading.restart_base_ms",
                "must not exceed trading.restart_max_ms",
            ));
        }

        let pairs = self.pairs()?;
        if pairs.is_empty() {
            return Err(ConfigError::MissingField {
                field: "simulation.pairs",
            }
            .into());
        }
        if !(self.simulation.starting_price.is_finite() && self.simulation.starting_price > 0.0) {
            return Err(invalid("simulation.starting_price", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.simulation.volatility) {
            return Err(invalid("simulation.volatility", "must be in [0, 1)"));
        }
        if self.simulation.starting_balance < 0.0 {
            return Err(invalid("simulation.starting_balance", "must not be negative"));
        }
        Ok(())
    }

    /// Simulated pairs, parsed.
    pub fn pairs(&self) -> Result<Vec<CurrencyPair>> {
        self.simulation
            .pairs
            .iter()
            .map(|raw| raw.parse::<CurrencyPair>().map_err(|e| invalid("simulation.pairs", e.to_string())))
            .collect()
    }

    /// Starting holdings: `starting_balance` of every listed base currency.
    pub fn starting_balances(&self) -> Result<Balances> {
        let mut balances = Balances::new();
        for pair in self.pairs()? {
            balances.set(pair.base().clone(), self.simulation.starting_balance);
        }
        Ok(balances)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
    .into()
}
