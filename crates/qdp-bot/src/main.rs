//! QDP trading session host - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Run one QDP trading session until interrupted.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via QDP_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    qdp_telemetry::init_logging()?;

    info!("Starting qdp-bot v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > QDP_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("QDP_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = qdp_bot::AppConfig::from_file(&config_path)?;
    info!(
        gateway = %config.trader.gateway,
        front = %config.trader.front,
        contracts = config.contracts.len(),
        "Configuration loaded"
    );

    let app = qdp_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
