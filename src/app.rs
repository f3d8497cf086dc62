//! App orchestration.
//!
//! Builds the process-wide pool, the broker and its rate-limited exchange,
//! the market producer the configured strategy needs, and the trading state
//! machine for the configured mode, then runs the state machine until it
//! stops.

use std::sync::Arc;

use tracing::info;

use crate::adapter::{SimulatedBroker, SimulationParams};
use crate::config::Config;
use crate::domain::Currency;
use crate::error::{ConfigError, Result};
use crate::exchange::{Broker, Exchange};
use crate::market::{HistoryMonitor, TickerMonitor};
use crate::runtime::ResourcePool;
use crate::strategy::{HistoryStrategy, TickerStrategy};
use crate::trading::{
    AlgExecutor, ExecutionMode, ExecutorHandle, HistoryAlgExecutor, LiveExecution, PaperExecution,
};

const DEFAULT_WALLET_CURRENCY: &str = "BTC";

/// The market producer feeding the running state machine.
enum Producer {
    Ticker(Arc<TickerMonitor>),
    History(Arc<HistoryMonitor>),
}

impl Producer {
    fn stop(&self) {
        match self {
            Producer::Ticker(monitor) => monitor.stop(),
            Producer::History(monitor) => monitor.stop(),
        }
    }
}

/// Main application struct.
pub struct App;

impl App {
    /// Run until the state machine stops.
    pub async fn run(config: Config) -> Result<()> {
        let pool = ResourcePool::from_cores();
        let broker: Arc<dyn Broker> = Arc::new(SimulatedBroker::new(simulation_params(&config)?));
        let exchange = Exchange::new(broker, pool.clone());

        info!(
            config = true,
            exchange = %exchange.name(),
            requests_per_second = exchange.requests_per_second_limit(),
            fee = exchange.fee(),
            heavy_workers = pool.heavy_workers(),
            light_workers = pool.light_workers(),
            "Exchange ready"
        );

        let (producer, handle) = Self::start(&config, exchange.clone(), pool)?;
        let result = handle.join().await;

        producer.stop();
        exchange.monitor().shutdown();
        result.map_err(Into::into)
    }

    /// Build and spawn the configured producer and state machine.
    fn start(
        config: &Config,
        exchange: Exchange,
        pool: ResourcePool,
    ) -> Result<(Producer, ExecutorHandle)> {
        let trading = &config.trading;
        let settings = trading.executor_settings();
        let wallet_currency = settings
            .base_currency
            .clone()
            .unwrap_or_else(|| Currency::new(DEFAULT_WALLET_CURRENCY));

        if let Some(strategy) = trading.strategy.ticker() {
            let monitor = TickerMonitor::new(exchange.clone(), strategy);
            let handle = spawn_ticker(config, &monitor, exchange, strategy, wallet_currency);
            return Ok((Producer::Ticker(monitor), handle));
        }
        if let Some(strategy) = trading.strategy.history() {
            let monitor = HistoryMonitor::new(exchange.clone(), strategy, pool);
            let handle = spawn_history(config, &monitor, exchange, strategy, wallet_currency);
            return Ok((Producer::History(monitor), handle));
        }
        Err(ConfigError::InvalidValue {
            field: "trading.strategy",
            reason: format!("{:?} has no producer", trading.strategy),
        }
        .into())
    }
}

fn spawn_ticker(
    config: &Config,
    monitor: &Arc<TickerMonitor>,
    exchange: Exchange,
    strategy: TickerStrategy,
    wallet_currency: Currency,
) -> ExecutorHandle {
    let trading = &config.trading;
    let settings = trading.executor_settings();
    info!(strategy = strategy.name(), mode = trading.mode.as_str(), "Starting live-ticker trading");

    match trading.mode {
        ExecutionMode::Paper => {
            let paper = PaperExecution::new(exchange.fee(), wallet_currency);
            AlgExecutor::new(Arc::clone(monitor), paper, settings).spawn()
        }
        ExecutionMode::Live => {
            let live = LiveExecution::new(exchange, trading.retry_period_secs, trading.settle_delay());
            AlgExecutor::new(Arc::clone(monitor), live, settings).spawn()
        }
    }
}

fn spawn_history(
    config: &Config,
    monitor: &Arc<HistoryMonitor>,
    exchange: Exchange,
    strategy: HistoryStrategy,
    wallet_currency: Currency,
) -> ExecutorHandle {
    let trading = &config.trading;
    let settings = trading.executor_settings();
    info!(strategy = strategy.name(), mode = trading.mode.as_str(), "Starting history trading");

    match trading.mode {
        ExecutionMode::Paper => {
            let paper = PaperExecution::new(exchange.fee(), wallet_currency);
            HistoryAlgExecutor::new(Arc::clone(monitor), paper, settings).spawn()
        }
        ExecutionMode::Live => {
            let live = LiveExecution::new(exchange, trading.retry_period_secs, trading.settle_delay());
            HistoryAlgExecutor::new(Arc::clone(monitor), live, settings).spawn()
        }
    }
}

/// Simulated market parameters from the `exchange` and `simulation` tables.
pub fn simulation_params(config: &Config) -> Result<SimulationParams> {
    Ok(SimulationParams {
        name: config.exchange.name.clone(),
        requests_per_second: config.exchange.requests_per_second,
        fee: config.exchange.fee,
        pairs: config.pairs()?,
        starting_price: config.simulation.starting_price,
        volatility: config.simulation.volatility,
        balances: config.starting_balances()?,
        seed: config.simulation.seed,
        api_key: config.exchange.api_key.clone(),
        api_secret: config.exchange.api_secret.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_params_from_defaults() {
        let params = simulation_params(&Config::default()).unwrap();
        assert_eq!(params.pairs.len(), 3);
        assert_eq!(params.balances.amount(&Currency::new("BTC")), 1.0);
        assert_eq!(params.requests_per_second, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_mode_without_credentials_stops() {
        let mut config = Config::default();
        config.trading.mode = ExecutionMode::Live;

        let err = App::run(config).await.unwrap_err();
        assert!(err.to_string().contains("configuration"));
    }
}
