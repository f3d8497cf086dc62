//! Handler for the `run` command.

use tracing::info;

use crate::app::App;
use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::Result;

/// Load configuration, apply overrides, initialize logging and trade.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;

    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }
    if let Some(mode) = args.mode {
        config.trading.mode = mode.into();
    }
    if let Some(strategy) = args.strategy {
        config.trading.strategy = strategy.into();
    }

    config.logging.init();
    info!(
        config = true,
        path = %args.config.display(),
        mode = config.trading.mode.as_str(),
        strategy = ?config.trading.strategy,
        "coin-trader starting"
    );

    App::run(config).await
}
