//! Parameters of the in-process simulated market.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Listed pairs as `BASE_QUOTE`.
    pub pairs: Vec<String>,
    pub starting_price: f64,
    /// Largest relative price move per ticker poll.
    pub volatility: f64,
    /// Starting holdings of every listed base currency.
    pub starting_balance: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            pairs: vec!["BTC_ETH".into(), "BTC_LTC".into(), "BTC_XMR".into()],
            starting_price: 0.05,
            volatility: 0.002,
            starting_balance: 1.0,
            seed: 7,
        }
    }
}
