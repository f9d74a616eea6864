//! `rollcall mark`: one-shot submission from the command line.
//!
//! Selects the session mode and submits the text in one go, printing the
//! same replies a chat user would get.

use std::path::Path;

use rollcall_channels::{CliChannel, Reply, respond};
use rollcall_core::channel::{Channel, ChannelMessage, InboundKind};
use rollcall_core::session::SessionMode;

use crate::runtime;

const CHAT: &str = "terminal";

pub async fn run(
    config_path: Option<&Path>,
    mode: SessionMode,
    requester: &str,
    text: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let stack = runtime::build(&config)?;
    let channel = CliChannel::with_sender(requester);

    let message = |kind| ChannelMessage {
        channel_id: channel.id().clone(),
        sender_id: requester.to_string(),
        sender_name: Some(requester.to_string()),
        chat_id: CHAT.into(),
        kind,
    };

    let selected = message(InboundKind::ModeSelected {
        mode,
        callback_id: None,
    });
    print_replies(&channel, respond(&stack.controller, &selected).await).await?;

    // a failed mode selection leaves no session, so the text would only be refused
    if stack.controller.session_count().await == 0 {
        return Err("No session could be started; see the message above".into());
    }

    let submitted = message(InboundKind::Text {
        text: text.to_string(),
    });
    print_replies(&channel, respond(&stack.controller, &submitted).await).await?;

    Ok(())
}

async fn print_replies(
    channel: &CliChannel,
    replies: Vec<Reply>,
) -> Result<(), Box<dyn std::error::Error>> {
    for reply in replies {
        match reply {
            // the mode keyboard has no meaning for a one-shot run
            Reply::Message(message) if message.offer_modes => {}
            Reply::Message(message) => channel.send(CHAT, &message).await?,
            Reply::Document(document) => channel.send_document(CHAT, &document).await?,
        }
    }
    Ok(())
}
