use clap::{Parser, Subcommand};
use log::{LevelFilter, info, warn};
use mini_kademlia::utils::setup_logging;
use mini_kademlia::{Config, Kademlia, Result, VERSION};
use std::path::PathBuf;
use tokio::io::BufReader;

#[derive(Parser)]
#[command(name = "mini-kademlia")]
#[command(about = "A Kademlia DHT node with an interactive shell")]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a node and open the shell on stdin/stdout
    Start {
        /// UDP port to listen on
        #[arg(short, long, default_value = "9000")]
        port: u16,
        /// Host to bind and advertise
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Act as the bootstrap node (takes the all-zero id)
        #[arg(long)]
        bootstrap_node: bool,
        /// Bootstrap node address (host:port)
        #[arg(short, long)]
        bootstrap: Option<String>,
        /// JSON config file; command line flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level);

    match cli.command {
        Commands::Start {
            port,
            host,
            bootstrap_node,
            bootstrap,
            config,
        } => {
            let mut config = match config {
                Some(path) => Config::load(&path)?,
                None => Config::default(),
            };
            config.address = format!("{}:{}", host, port);
            config.bootstrap = config.bootstrap || bootstrap_node;
            if bootstrap.is_some() {
                config.bootstrap_address = bootstrap;
            }
            config.validate()?;

            info!("mini-kademlia {} starting on {}", VERSION, config.address);
            let kademlia = Kademlia::bind_udp(config).await?;
            kademlia.start().await;
            if let Err(e) = kademlia.join().await {
                warn!("Failed to join network: {}", e);
            }

            let shell = kademlia.shell();
            tokio::select! {
                result = shell.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => result?,
                _ = tokio::signal::ctrl_c() => info!("Ctrl+C received, shutting down"),
            }

            kademlia.shutdown().await?;
        }
    }

    Ok(())
}
