mod main_runtime;

use anyhow::{Context, Result};
use clap::Parser;
use ganyan::cli::Cli;
use ganyan::config::AppConfig;
use tracing::info;

use main_runtime::{init_logging, init_logging_simple};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    if cli.command.is_long_running() {
        init_logging(&config.logging);
        info!("ganyan {} starting", env!("CARGO_PKG_VERSION"));
    } else {
        init_logging_simple();
    }

    cli.run(config).await
}
