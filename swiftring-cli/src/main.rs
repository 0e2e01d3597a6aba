mod bootstrap;
mod generate;

use bootstrap::Bootstrap;
use generate::Generate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use swiftring_core::SshExecutor;

#[derive(Debug, Parser)]
#[command(name = "swiftring")]
#[command(about = "Build and distribute Swift rings from a declarative cluster topology", long_about = None)]
#[command(version)]
struct Cli {
    /// SSH identity file used to reach the cluster nodes
    #[arg(short = 'i', long = "identity-file", global = true)]
    identity_file: Option<PathBuf>,

    /// SSH user used to reach the cluster nodes
    #[arg(short = 'u', long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Discover the disks, build the rings and copy them to every node")]
    Bootstrap(Bootstrap),
    #[command(about = "Discover the disks and write the ring builder script without running it")]
    Generate(Generate),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ssh = SshExecutor::new(cli.user, cli.identity_file);

    match cli.command {
        Commands::Bootstrap(cmd) => bootstrap::handle(cmd, ssh).await,
        Commands::Generate(cmd) => generate::handle(cmd, ssh).await,
    }
}
