//! Configuration validation command.

use std::path::Path;

use crate::config::{Config, API_KEY_ENV, API_SECRET_ENV};
use crate::error::Result;
use crate::trading::ExecutionMode;

/// Validate a configuration file and print a summary.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    println!("Checking configuration: {}", path.display());
    println!();

    let config = Config::load(path)?;
    println!("✓ Configuration file is valid");
    println!();
    println!("Summary:");
    println!("  Exchange: {}", config.exchange.name);
    println!("  Requests/second: {}", config.exchange.requests_per_second);
    println!("  Fee: {}", config.exchange.fee);
    println!("  Mode: {}", config.trading.mode.as_str());
    println!("  Strategy: {:?}", config.trading.strategy);
    match config.trading.base_currency() {
        Some(base) => println!("  Base currency: {base}"),
        None => println!("  Base currency: any"),
    }
    println!("  Pairs: {}", config.simulation.pairs.join(", "));
    println!();

    if config.exchange.has_credentials() {
        println!("✓ Exchange credentials found");
    } else if config.trading.mode == ExecutionMode::Live {
        println!("⚠ Live mode needs exchange credentials");
        println!("  Set {API_KEY_ENV} and {API_SECRET_ENV}, or api_key / api_secret in [exchange]");
    } else {
        println!("  No exchange credentials (not needed for paper mode)");
    }
    Ok(())
}
