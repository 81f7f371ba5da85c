use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "guildvault")]
#[command(about = "Archive a Discord server's channels, threads, and attachments. Resumable.")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = guildvault_core::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new messages and attachments into the local archive
    Archive {
        /// Server id to archive (overrides the config file)
        #[arg(long)]
        server: Option<String>,

        /// Archive directory (overrides the config file)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Summarize what the local archive currently holds (offline)
    Status {
        /// Archive directory (overrides the config file)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logs (hidden by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Archive { server, dir } => commands::archive::run(&cli.config, server, dir).await,
        Commands::Status { dir } => commands::status::run(&cli.config, dir),
    }
}
