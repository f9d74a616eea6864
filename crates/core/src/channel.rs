//! Channel trait: the abstraction over chat transports.
//!
//! A Channel connects rollcall to a messaging platform (Telegram, a local
//! terminal, ...). It turns platform updates into [`ChannelMessage`]s and
//! delivers rendered replies and artifact documents back.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::session::{RequesterId, SessionMode};

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an inbound message asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundKind {
    /// Free text: registration endings to mark absent.
    Text { text: String },
    /// A slash command such as `/start` (name without the slash).
    Command { name: String, args: String },
    /// A session-mode button was pressed.
    ModeSelected {
        mode: SessionMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        callback_id: Option<String>,
    },
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// The chat/group/DM identifier within the channel
    pub chat_id: String,

    pub kind: InboundKind,
}

impl ChannelMessage {
    /// Session key for this message's sender.
    pub fn requester(&self) -> RequesterId {
        RequesterId::scoped(&self.channel_id.0, &self.sender_id)
    }
}

/// A reply to send to a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
    /// Attach the "Add Absent" / "New Absent" choice.
    #[serde(default)]
    pub offer_modes: bool,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            offer_modes: false,
        }
    }

    pub fn with_modes(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            offer_modes: true,
        }
    }
}

/// A file to deliver to a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundDocument {
    pub path: PathBuf,
    /// Name shown to the recipient.
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, message
/// formatting, and sender allowlisting.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "telegram", "cli").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for incoming messages.
    ///
    /// Returns a receiver that yields incoming messages. The channel
    /// implementation handles polling or webhook injection internally.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Send a reply to a specific chat.
    async fn send(
        &self,
        chat_id: &str,
        message: &OutboundMessage,
    ) -> std::result::Result<(), ChannelError>;

    /// Deliver a file to a specific chat.
    async fn send_document(
        &self,
        chat_id: &str,
        document: &OutboundDocument,
    ) -> std::result::Result<(), ChannelError>;

    /// Acknowledge a button press (if the platform needs it).
    async fn acknowledge(&self, _callback_id: &str) -> std::result::Result<(), ChannelError> {
        Ok(()) // No-op default
    }

    /// Check if a sender is allowed (allowlist check).
    fn is_allowed(&self, sender_id: &str) -> bool;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check: is the channel connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requester_is_scoped_by_channel() {
        let msg = ChannelMessage {
            channel_id: ChannelId("telegram".into()),
            sender_id: "12345".into(),
            sender_name: Some("Alice".into()),
            chat_id: "67890".into(),
            kind: InboundKind::Text { text: "1,3".into() },
        };
        assert_eq!(msg.requester().as_str(), "telegram:12345");
    }

    #[test]
    fn inbound_kind_serialization() {
        let kind = InboundKind::ModeSelected {
            mode: SessionMode::Continue,
            callback_id: None,
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("mode_selected"));
        assert!(json.contains("continue"));
        assert!(!json.contains("callback_id"));
    }

    #[test]
    fn outbound_constructors() {
        assert!(!OutboundMessage::text("hi").offer_modes);
        assert!(OutboundMessage::with_modes("pick").offer_modes);
    }
}
