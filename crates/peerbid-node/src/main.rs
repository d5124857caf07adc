//! peerbid - PeerBid auction node
//!
//! Starts a node, joins the network through an optional bootstrap peer, and
//! hands the terminal to the operator shell.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use peerbid_node::{Node, NodeConfig, Shell};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "peerbid")]
#[command(about = "Leaderless peer-to-peer auction node")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a node and open the operator shell
    Run {
        /// Path to a JSON config file
        #[arg(short, long, env = "PEERBID_CONFIG")]
        config: Option<PathBuf>,

        /// Display name used as seller and bidder identity
        #[arg(long, env = "PEERBID_NAME")]
        name: Option<String>,

        /// Host other nodes use to reach this one
        #[arg(long, env = "PEERBID_HOST")]
        host: Option<String>,

        /// RPC listen port
        #[arg(short, long, env = "PEERBID_PORT")]
        port: Option<u16>,

        /// host:port of a peer to join through
        #[arg(short, long, env = "PEERBID_BOOTSTRAP")]
        bootstrap: Option<String>,

        /// Directory for the JSON auction store
        #[arg(long, env = "PEERBID_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "peerbid.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("peerbid=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            name,
            host,
            port,
            bootstrap,
            data_dir,
        } => {
            let mut config = match config {
                Some(path) => NodeConfig::from_file(&path)?,
                None => NodeConfig::default(),
            };
            if let Some(name) = name {
                config.name = name;
            }
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if bootstrap.is_some() {
                config.bootstrap = bootstrap;
            }
            if data_dir.is_some() {
                config.data_dir = data_dir;
            }
            run_node(config).await?;
        }

        Commands::InitConfig { output } => {
            NodeConfig::default().save(&output)?;
            println!("Wrote sample config to {}", output.display());
        }
    }

    Ok(())
}

async fn run_node(config: NodeConfig) -> anyhow::Result<()> {
    config.validate()?;
    let node = Node::start(config).await?;

    if let Some(outcome) = node.join().await {
        if outcome.joined {
            info!(attempts = outcome.attempts, new_peers = outcome.new_peers, "joined network");
        } else {
            warn!(attempts = outcome.attempts, "bootstrap unreachable, running standalone");
        }
    }

    println!("{}", node.greeting());

    let shell = Shell::new(Arc::clone(node.context()));
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = shell.run(stdin, tokio::io::stdout()) => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    node.shutdown().await;
    Ok(())
}
