use clap::{Parser, Subcommand};
use tracing::{error, info};

use user_service::{app, config::Config, telemetry};

#[derive(Debug, Parser)]
#[command(name = "user-service", version, about = "User records over HTTP and the broker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the user API
    Serve,
    /// Run a broker consumer by name
    Consumer {
        /// Consumer to run (`user_create_consumer`)
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    telemetry::init(&config)?;

    info!(
        app = %config.app,
        environment = %config.environment,
        version = env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let result = match &cli.command {
        Command::Serve => app::serve(&config).await,
        Command::Consumer { name } => app::run_consumer(&config, name).await,
    };

    if let Err(err) = &result {
        error!("stopped with error: {err:#}");
    }
    result
}
