//! DropPay CLI
//!
//! Runs the signed-transaction relay and submits pre-signed transactions
//! through it.

use clap::{Parser, Subcommand};
use droppay::{ConfigStore, GroupSubmitter, RelayClient, Result, ServerConfig, SignedBlob};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

#[derive(Parser)]
#[command(name = "droppay")]
#[command(about = "DropPay relay and submission tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve,

    /// Print the public configuration the relay serves
    Config,

    /// Submit base64 signed transactions through a relay
    Submit {
        /// Relay base URL
        #[arg(short, long, default_value = "http://localhost:3000")]
        relay: Url,

        /// Submit all blobs as one atomic group
        #[arg(short, long)]
        group: bool,

        /// Signed transactions, base64
        #[arg(required = true)]
        blobs: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    if let Ok(path) = std::env::var("DOTENV_PATH") {
        dotenvy::from_path(path).ok();
    } else {
        dotenvy::dotenv().ok();
    }

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(cli.json_logs.then(|| fmt::layer().json()))
        .with((!cli.json_logs).then(fmt::layer))
        .with(filter)
        .init();

    match cli.command {
        Commands::Serve => {
            let config = ServerConfig::from_env()?;
            tracing::info!(
                node = %config.node.address(),
                app_id = config.current_app_id(),
                "Starting relay"
            );
            droppay::relay::serve(config).await?;
        }
        Commands::Config => {
            let config = ServerConfig::from_env()?;
            println!("{}", serde_json::to_string_pretty(&config.public_config())?);
        }
        Commands::Submit {
            relay,
            group,
            blobs,
        } => {
            run_submit(relay, group, blobs).await?;
        }
    }

    Ok(())
}

async fn run_submit(relay: Url, group: bool, blobs: Vec<String>) -> Result<()> {
    let blobs = blobs
        .iter()
        .map(|b| SignedBlob::from_base64(b))
        .collect::<Result<Vec<_>>>()?;

    let store = Arc::new(ConfigStore::new(relay));
    store.load().await?;
    let submitter = GroupSubmitter::new(Arc::new(RelayClient::new(store)));

    let receipts = if group {
        vec![submitter.submit_concatenated(blobs).await?]
    } else {
        submitter.submit_each(blobs).await?
    };

    for receipt in &receipts {
        println!("{}", serde_json::to_string(receipt)?);
    }
    Ok(())
}
