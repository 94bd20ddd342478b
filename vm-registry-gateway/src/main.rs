//! Registry gateway binary.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vm_registry_gateway::{run_server, ConfigOverrides, GatewayConfig};

/// Read from the working directory when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "registry-gateway.json";

#[derive(Parser)]
#[command(name = "registry-gateway")]
#[command(about = "Aggregate several npm registries behind one endpoint")]
#[command(version)]
struct Cli {
    /// JSON configuration file [default: ./registry-gateway.json if present]
    #[arg(long)]
    config: Option<PathBuf>,

    /// The address to bind to
    #[arg(short, long)]
    address: Option<String>,

    /// The port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream registry, highest priority first (repeatable)
    #[arg(short = 'r', long = "registry", value_name = "URL")]
    registries: Vec<String>,

    /// Registry used for everything other than package lookups
    #[arg(short, long = "default", value_name = "URL")]
    default_registry: Option<String>,

    /// Timeout for each upstream request, in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Do not log incoming requests
    #[arg(long)]
    no_log: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            address: self.address.clone(),
            port: self.port,
            registries: self.registries.clone(),
            default_registry: self.default_registry.clone(),
            timeout_secs: self.timeout,
            log_requests: self.no_log.then_some(false),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => GatewayConfig::load(path)?,
        None => GatewayConfig::load_or_default(DEFAULT_CONFIG_FILE)?,
    }
    .with_overrides(cli.overrides());

    run_server(config).await
}
