//! CLI channel: interactive terminal session.
//!
//! Reads lines from stdin and prints replies to stdout. Mode buttons are
//! shown as the `/continue` and `/new` commands. Used by `rollcall serve
//! --channel cli`.

use async_trait::async_trait;
use rollcall_core::channel::{Channel, ChannelId, ChannelMessage, OutboundDocument, OutboundMessage};
use rollcall_core::error::ChannelError;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::inbound::classify;
use crate::render::{ADD_ABSENT_LABEL, NEW_ABSENT_LABEL};

/// Interactive CLI channel for terminal-based sessions.
pub struct CliChannel {
    id: ChannelId,
    sender_id: String,
}

impl CliChannel {
    pub fn new() -> Self {
        Self::with_sender("local")
    }

    /// A CLI channel whose messages come from `sender_id`.
    pub fn with_sender(sender_id: impl Into<String>) -> Self {
        Self {
            id: ChannelId("cli".into()),
            sender_id: sender_id.into(),
        }
    }

    /// Turn one input line into a message. `None` for blank lines.
    fn parse_line(&self, line: &str) -> Option<ChannelMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(ChannelMessage {
            channel_id: self.id.clone(),
            sender_id: self.sender_id.clone(),
            sender_name: Some(self.sender_id.clone()),
            chat_id: "terminal".into(),
            kind: classify(line),
        })
    }

    fn format(message: &OutboundMessage) -> String {
        if message.offer_modes {
            format!(
                "{}\n  /continue  {ADD_ABSENT_LABEL}\n  /new       {NEW_ABSENT_LABEL}",
                message.text
            )
        } else {
            message.text.clone()
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn is_exit(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let template = Self {
            id: self.id.clone(),
            sender_id: self.sender_id.clone(),
        };

        tokio::spawn(async move {
            let mut lines = BufReader::new(io::stdin()).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if is_exit(line.trim()) {
                            break;
                        }
                        let Some(msg) = template.parse_line(&line) else {
                            continue;
                        };
                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, _chat_id: &str, message: &OutboundMessage) -> Result<(), ChannelError> {
        println!("{}\n", Self::format(message));
        Ok(())
    }

    async fn send_document(
        &self,
        _chat_id: &str,
        document: &OutboundDocument,
    ) -> Result<(), ChannelError> {
        match &document.caption {
            Some(caption) => println!("📎 {caption}\n   {}\n", document.path.display()),
            None => println!("📎 {}\n", document.path.display()),
        }
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // local terminal user
    }
}
