//! Exchange connection settings.

use serde::Deserialize;

pub const API_KEY_ENV: &str = "COIN_TRADER_API_KEY";
pub const API_SECRET_ENV: &str = "COIN_TRADER_API_SECRET";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub name: String,
    pub requests_per_second: u32,
    /// Fraction of the traded amount, e.g. 0.0025.
    pub fee: f64,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl ExchangeConfig {
    /// Replace credentials with the environment's, where set.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Ok(secret) = std::env::var(API_SECRET_ENV) {
            self.api_secret = Some(secret);
        }
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.api_key) && present(&self.api_secret)
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            name: "simulated".into(),
            requests_per_second: 6,
            fee: 0.0025,
            api_key: None,
            api_secret: None,
        }
    }
}
