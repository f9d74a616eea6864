//! `rollcall serve`: run the bot until interrupted.

use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;
use rollcall_channels::{ChannelRegistry, CliChannel, Dispatcher, TelegramChannel, TelegramConfig};
use rollcall_config::TelegramMode;
use rollcall_core::store::RosterStore;
use rollcall_gateway::GatewayState;
use tracing::{error, info};

use crate::runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChannelKind {
    /// Telegram Bot API, polling or webhook per config
    Telegram,
    /// Interactive terminal session
    Cli,
}

pub async fn run(config_path: Option<&Path>, kind: ChannelKind) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let stack = runtime::build(&config)?;

    let rows = stack
        .roster
        .row_count()
        .await
        .map_err(|e| format!("Cannot read the roster: {e}"))?;

    let mut registry = ChannelRegistry::new();
    let mut webhook = None;
    match kind {
        ChannelKind::Cli => registry.register(Arc::new(CliChannel::new())),
        ChannelKind::Telegram => {
            if !config.has_bot_token() {
                return Err(
                    "No Telegram bot token configured. Set telegram.bot_token or ROLLCALL_BOT_TOKEN".into(),
                );
            }
            let telegram = Arc::new(TelegramChannel::new(TelegramConfig::from(&config.telegram)));
            if config.telegram.mode == TelegramMode::Webhook {
                webhook = Some(telegram.clone());
            }
            registry.register(telegram);
        }
    }
    let registry = Arc::new(registry);

    println!("📋 rollcall");
    println!("   Roster:   {} ({rows} students)", config.roster.path.display());
    println!("   Sheets:   {}", config.artifacts.dir.display());
    println!("   Channels: {}", registry.list().join(", "));

    // The gateway goes up first so webhook deliveries have somewhere to land.
    let gateway = if kind == ChannelKind::Telegram {
        let mut state = GatewayState::new(stack.controller.clone());
        if let Some(telegram) = webhook {
            state = state.with_telegram(telegram, config.telegram.webhook_secret.clone());
        }
        let host = config.gateway.host.clone();
        let port = config.gateway.port;
        println!("   Gateway:  {host}:{port}");
        Some(tokio::spawn(async move {
            if let Err(e) = rollcall_gateway::serve(&host, port, state).await {
                error!(error = %e, "Gateway stopped");
            }
        }))
    } else {
        println!("\nChoose a mode with /continue or /new, then send registration endings. Type 'exit' to quit.\n");
        None
    };

    let inbound = registry.start_all().await?;
    let dispatcher = Dispatcher::new(stack.controller.clone(), registry.clone());

    tokio::select! {
        _ = dispatcher.run(inbound) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    registry.stop_all().await;
    if let Some(gateway) = gateway {
        gateway.abort();
    }
    Ok(())
}
