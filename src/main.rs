use clap::Parser;
use coin_trader::cli::{check, run, Cli, Commands, RunArgs};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::CheckConfig(arg)) => {
            if let Err(e) = check::execute_config(&arg.config) {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Run(args)) => run_until_interrupted(&args).await,
        None => run_until_interrupted(&RunArgs::default()).await,
    }
}

async fn run_until_interrupted(args: &RunArgs) {
    tokio::select! {
        result = run::execute(args) => {
            if let Err(e) = result {
                // Logging may not be initialized if the config failed to load.
                eprintln!("Fatal error: {e}");
                error!(error = %e, "Fatal error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("coin-trader stopped");
}
