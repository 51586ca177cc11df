//! Tallygram CLI — the main entry point.
//!
//! Commands:
//! - `run`    — Start the bot (Telegram long polling)
//! - `status` — Show configuration and binding summary

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "tallygram",
    about = "Tallygram — conversational measurement tracking into spreadsheets",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot and poll for messages
    Run,

    /// Show configuration and binding summary
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run => commands::run::run().await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
