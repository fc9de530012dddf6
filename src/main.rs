use anyhow::Result;
use clap::Parser;
use netpreseed::{init_logging, load_config};
use netpreseed_api::ServerBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};

/// netpreseed - dynamic preseed and installer script generator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "NETPRESEED_CONFIG", default_value = "config/config.yaml")]
    config: PathBuf,

    /// Override bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config, args.bind, args.log_level.as_deref())?;
    init_logging(&config.logging);

    info!("Starting netpreseed");
    info!("Configuration loaded from {:?}", args.config);
    info!("Bind address: {}", config.server.bind_address());
    info!("Plugin directory: {}", config.plugins.directory.display());

    let server = ServerBuilder::new(config).build()?;

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
