#![forbid(unsafe_code)]
//! UFChain node: opens the ledger and serves the REST API

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use ufchain::config::{load_config_from, DEFAULT_CONFIG_PATH};
use ufchain::node::{init_tracing, Node};

#[derive(Parser, Debug)]
#[command(name = "ufchain-node", version, about = "Run a UFChain ledger node")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the API port from the configuration
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config_from(&cli.config)?;
    if let Some(port) = cli.port {
        config.api.port = port;
    }
    init_tracing(&config.logging.level);

    let node = Node::init(config)?;
    println!(
        "{} listening on http://{}/api",
        "UFChain node".green().bold(),
        node.config.bind_address()
    );

    node.run(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    })
    .await
}
