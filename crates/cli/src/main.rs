//! rollcall CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write a default config
//! - `serve`: Run the bot on Telegram (or an interactive terminal)
//! - `mark`: One-shot submission from the command line
//! - `status`: Show roster and archive state
//! - `doctor`: Diagnose configuration and connectivity

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rollcall_core::session::SessionMode;

mod commands;
mod runtime;

use commands::serve::ChannelKind;

#[derive(Parser)]
#[command(
    name = "rollcall",
    about = "rollcall — mark students absent from a chat, never touching the original sheet",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of ~/.rollcall/config.toml
    #[arg(short, long, global = true, env = "ROLLCALL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Run the bot
    Serve {
        /// Which transport to serve on
        #[arg(long, value_enum, default_value_t = ChannelKind::Telegram)]
        channel: ChannelKind,
    },

    /// Mark registration endings absent in one go
    Mark {
        /// Session mode: `continue` keeps editing the latest sheet, `new` starts over
        #[arg(short, long, default_value = "continue")]
        mode: SessionMode,

        /// Requester identity the working sheet is kept under
        #[arg(short, long, default_value = "local")]
        requester: String,

        /// Registration endings, e.g. "1,3,5"
        text: String,
    },

    /// Show roster and working sheet status
    Status,

    /// Diagnose configuration, roster and Telegram access
    Doctor,
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

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Serve { channel } => commands::serve::run(config_path, channel).await?,
        Commands::Mark {
            mode,
            requester,
            text,
        } => commands::mark::run(config_path, mode, &requester, &text).await?,
        Commands::Status => commands::status::run(config_path).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
