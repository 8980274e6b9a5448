//! Snoop Agent - registers a service with a Snoop registry and keeps it live.
//!
//! Useful for services that do not link `snoop-client` themselves: run it
//! next to the service and stop it with Ctrl+C to deregister.

use anyhow::Result;
use clap::Parser;
use snoop_client::{AgentConfig, HeartbeatAgent, WsTransport};
use snoop_core::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "snoop-agent")]
#[command(about = "Register a service with a Snoop registry")]
struct Args {
    /// Base URL of the registry
    #[arg(long, env = "SNOOP_REGISTRY_URL", default_value = ClientConfig::DEFAULT_REGISTRY_URL)]
    registry: String,

    /// Service name to register under
    #[arg(long, env = "SNOOP_SERVICE_NAME")]
    name: Option<String>,

    /// host:port (or full base URL) the service listens on
    #[arg(long, env = "SNOOP_SERVICE_HOME")]
    home: Option<String>,

    /// API root path below the service home
    #[arg(long, env = "SNOOP_SERVICE_ROOT", default_value = "")]
    root: String,

    /// Seconds between heartbeats
    #[arg(long, default_value_t = ClientConfig::HEARTBEAT_PERIOD.as_secs())]
    period_secs: u64,

    /// Do not register at all
    #[arg(long, env = "SNOOP_DISABLED")]
    disabled: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn agent_config(&self) -> AgentConfig {
        let mut config = AgentConfig::new(self.registry.clone())
            .enabled(!self.disabled)
            .root(self.root.clone())
            .heartbeat_period(Duration::from_secs(self.period_secs));
        config.identity = self.name.clone();
        config.home = self.home.clone();
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = args.agent_config();
    let Some(agent) = HeartbeatAgent::start_if_enabled(&config, Arc::new(WsTransport::new()))?
    else {
        info!("Registration disabled, nothing to do");
        return Ok(());
    };

    info!("Agent running for {}", agent.descriptor());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, deregistering");
    agent.shutdown().await;

    Ok(())
}
