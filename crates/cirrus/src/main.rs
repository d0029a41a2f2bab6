//! Cirrus node - main entry point.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cirrus::{Config, Node};

/// Decentralized cluster node with proof-carrying consensus.
#[derive(Parser, Debug)]
#[command(name = "cirrus", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, short, default_value = "cirrus.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut node = match Node::new(config).await {
        Ok(node) => node,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };

    if let Err(e) = node.run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
