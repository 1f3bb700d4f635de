use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use faas_gateway::config::load_config;
use faas_gateway::lifecycle::startup;
use faas_gateway::observability::logging;

#[derive(Debug, Parser)]
#[command(name = "faas-gateway", version, about = "Function-as-a-service gateway")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "FAAS_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    logging::init(&config.observability.log_level);

    if cli.check {
        tracing::info!("Configuration is valid");
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        gateway = %config.gateway.bind_address,
        workers = %config.workers.bind_address,
        "faas-gateway starting"
    );

    startup::run(config).await?;
    tracing::info!("faas-gateway stopped");
    Ok(())
}
