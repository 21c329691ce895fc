use clap::Parser;
use std::path::PathBuf;

use route_gateway::config::loader::load_config;
use route_gateway::config::GatewayConfig;
use route_gateway::lifecycle::{self, shutdown_on_signal};
use route_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "route-gateway")]
#[command(about = "API gateway with per-route request scripts", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("route-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        gateway_address = %config.listener.bind_address,
        admin_address = %config.admin.bind_address,
        workers = config.listener.workers,
        exec_timeout_ms = config.script.exec_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = lifecycle::start(config).await?;
    tokio::spawn(shutdown_on_signal(gateway.shutdown_handle()));

    gateway.wait().await?;
    Ok(())
}
