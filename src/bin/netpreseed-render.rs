//! netpreseed-render - render one preseed response without the HTTP server
//!
//! Runs the same pipeline as the server for a given client address and query
//! string and writes the result to stdout. Useful for checking plugin
//! definitions before installers see them.

use anyhow::{Context, Result};
use clap::Parser;
use netpreseed::{init_logging, load_config};
use netpreseed_api::{ClientResolver, PreseedRequest, ServerBuilder, StaticResolver};
use netpreseed_core::StaticDirectory;
use std::io::Write;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use url::Url;

/// Render a preseed file or installer script for one client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "NETPRESEED_CONFIG", default_value = "config/config.yaml")]
    config: PathBuf,

    /// Client address to render for
    #[arg(long, default_value = "127.0.0.1")]
    ip: IpAddr,

    /// Query string as the installer would send it, e.g. "class=web&script=late"
    #[arg(short, long, default_value = "")]
    query: String,

    /// Reverse DNS name to assume instead of a lookup
    #[arg(long)]
    name: Option<String>,

    /// Hardware address to assume instead of an ARP lookup
    #[arg(long)]
    hwaddr: Option<String>,

    /// URL the early/late commands call back
    #[arg(long, default_value = "http://localhost:8080/preseed")]
    base_url: Url,

    /// Skip the directory service; clients only get request classes
    #[arg(long)]
    offline: bool,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = load_config(&args.config, None, args.log_level.as_deref())?;
    init_logging(&config.logging);

    let mut builder = ServerBuilder::new(config);
    if args.offline {
        builder = builder.with_connector(Arc::new(StaticDirectory::default()));
    }
    if args.name.is_some() || args.hwaddr.is_some() {
        builder = builder.with_resolver(static_resolver(&args));
    }
    let server = builder.build()?;

    let request = PreseedRequest {
        remote_ip: args.ip,
        query: args.query.trim_start_matches('?').to_string(),
        base_url: args.base_url.clone(),
        headers: Vec::new(),
    };

    let mut stdout = std::io::stdout().lock();
    match server.service().handle(request).await {
        Ok(rendered) => {
            stdout
                .write_all(rendered.body.as_bytes())
                .context("Failed to write output")?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            stdout
                .write_all(e.body().as_bytes())
                .context("Failed to write output")?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn static_resolver(args: &Args) -> Arc<dyn ClientResolver> {
    let mut resolver = StaticResolver::new();
    if let Some(ref name) = args.name {
        resolver = resolver.with_name(args.ip, name.clone());
    }
    if let Some(ref hwaddr) = args.hwaddr {
        resolver = resolver.with_hardware_address(args.ip, hwaddr.clone());
    }
    Arc::new(resolver)
}
