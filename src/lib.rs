//! coin_trader - signal-driven currency-exchange trading.
//!
//! Every broker call goes through a per-exchange, rate-limited priority
//! scheduler. Market producers poll tickers or candle history into per-pair
//! indicators and broadcast the results; trading state machines pick a
//! candidate, buy it, hold until the indicator says sell, and settle.
//!
//! # Modules
//!
//! - [`exchange`] - broker capability, job model, scheduler and facade
//! - [`market`] - ticker and history producers, broadcast hub
//! - [`strategy`] - Bollinger, Reaction and History-Bollinger indicators
//! - [`trading`] - state machines, order protocols, paper execution
//! - [`domain`] - currencies, tickers, candles, balances, trades
//! - [`adapter`] - concrete brokers (an in-process simulated market)
//! - [`runtime`] - worker pools and backoff
//! - [`config`] - TOML configuration with env overrides
//! - [`error`] - error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use coin_trader::adapter::SimulatedBroker;
//! use coin_trader::config::Config;
//! use coin_trader::exchange::Exchange;
//! use coin_trader::runtime::ResourcePool;
//!
//! # async fn demo() -> coin_trader::error::Result<()> {
//! let config = Config::default();
//! let broker = Arc::new(SimulatedBroker::new(coin_trader::app::simulation_params(&config)?));
//! let exchange = Exchange::new(broker, ResourcePool::from_cores());
//! let tickers = exchange.get_tickers().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod market;
pub mod runtime;
pub mod strategy;
pub mod trading;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
