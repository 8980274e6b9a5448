//! Snoop Service - service discovery registry.
//!
//! Clients register over WebSocket and send a heartbeat every ten seconds;
//! other processes look services up over HTTP.

use anyhow::Result;
use clap::Parser;
use snoop_core::{ClientRegistry, RegistryConfig};
use snoop_service::{start_server, ServerOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "snoop-service")]
#[command(about = "Service discovery registry")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value_t = RegistryConfig::DEFAULT_PORT)]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = RegistryConfig::DEFAULT_HOST)]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Evict clients whose last heartbeat is older than this many seconds
    /// (at least 60). Stale clients are kept until deregistered when unset.
    #[arg(long, value_parser = clap::value_parser!(u64).range(RegistryConfig::CLIENT_TTL.as_secs()..))]
    evict_after_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Snoop service");

    let registry = Arc::new(ClientRegistry::new());
    let options = ServerOptions {
        evict_after: args.evict_after_secs.map(Duration::from_secs),
    };

    let handle = start_server(registry, &args.host, args.port, options).await?;

    // Print port for launchers and tests (intentional stdout)
    println!("SNOOP_PORT={}", handle.addr().port());

    info!("Snoop service running on {}", handle.addr());

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");
    handle.stopped().await;

    Ok(())
}
