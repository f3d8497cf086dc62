//! Command-line interface definitions.

pub mod check;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::strategy::StrategyKind;
use crate::trading::ExecutionMode;

/// coin-trader - signal-driven trading over a rate-limited exchange.
#[derive(Parser, Debug)]
#[command(name = "coin-trader")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the trading state machine (default)
    Run(RunArgs),

    /// Validate a configuration file without trading
    CheckConfig(ConfigPathArg),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty
    #[arg(long)]
    pub json_logs: bool,

    /// Override the trading mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Override the strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.toml"),
            log_level: None,
            json_logs: false,
            mode: None,
            strategy: None,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Live,
    Paper,
}

impl From<ModeArg> for ExecutionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Live => ExecutionMode::Live,
            ModeArg::Paper => ExecutionMode::Paper,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyArg {
    Bollinger,
    Reaction,
    HistoryBollinger,
}

impl From<StrategyArg> for StrategyKind {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::Bollinger => StrategyKind::Bollinger,
            StrategyArg::Reaction => StrategyKind::Reaction,
            StrategyArg::HistoryBollinger => StrategyKind::HistoryBollinger,
        }
    }
}
