//! Channel registry: manages all active channel instances.
//!
//! Merges inbound messages from every channel into one stream for the
//! dispatcher and routes replies back to the channel a message came from.

use std::collections::HashMap;
use std::sync::Arc;

use rollcall_core::channel::{Channel, ChannelMessage, OutboundDocument, OutboundMessage};
use rollcall_core::error::ChannelError;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Central registry holding all enabled channel instances.
pub struct ChannelRegistry {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a channel adapter.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "Registered channel");
        self.channels.insert(name, channel);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Channel>> {
        self.channels.get(name)
    }

    /// All registered channel names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Start all channels and merge their message streams into one receiver.
    pub async fn start_all(
        &self,
    ) -> Result<mpsc::Receiver<(String, Result<ChannelMessage, ChannelError>)>, ChannelError> {
        let (merged_tx, merged_rx) = mpsc::channel(256);

        for (name, channel) in &self.channels {
            let mut rx = channel.start().await?;
            let tx = merged_tx.clone();
            let channel_name = name.clone();

            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    if tx.send((channel_name.clone(), msg)).await.is_err() {
                        break; // Merged receiver dropped
                    }
                }
            });

            info!(channel = %name, "Started channel");
        }

        Ok(merged_rx)
    }

    fn channel(&self, name: &str) -> Result<&Arc<dyn Channel>, ChannelError> {
        self.channels
            .get(name)
            .ok_or_else(|| ChannelError::NotConfigured(format!("Channel '{name}' not found")))
    }

    /// Send a message to a chat on a specific channel.
    pub async fn send_to(
        &self,
        channel_name: &str,
        chat_id: &str,
        message: &OutboundMessage,
    ) -> Result<(), ChannelError> {
        self.channel(channel_name)?.send(chat_id, message).await
    }

    /// Deliver a document to a chat on a specific channel.
    pub async fn send_document_to(
        &self,
        channel_name: &str,
        chat_id: &str,
        document: &OutboundDocument,
    ) -> Result<(), ChannelError> {
        self.channel(channel_name)?
            .send_document(chat_id, document)
            .await
    }

    pub async fn acknowledge_on(&self, channel_name: &str, callback_id: &str) -> Result<(), ChannelError> {
        self.channel(channel_name)?.acknowledge(callback_id).await
    }

    /// Stop all channels gracefully.
    pub async fn stop_all(&self) {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!(channel = %name, error = %e, "Failed to stop channel");
            }
        }
    }

    /// Run health checks on all channels.
    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        let mut results = HashMap::new();
        for (name, channel) in &self.channels {
            let healthy = channel.health_check().await.unwrap_or(false);
            results.insert(name.clone(), healthy);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rollcall_core::channel::{ChannelId, InboundKind};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockChannel {
        name: String,
        channel_id: ChannelId,
        started: AtomicBool,
        stopped: AtomicBool,
        sent: Mutex<Vec<String>>,
        inbound: tokio::sync::Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
    }

    impl MockChannel {
        fn new(name: &str) -> Self {
            Self {
                name: name.into(),
                channel_id: ChannelId(name.into()),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                sent: Mutex::new(Vec::new()),
                inbound: tokio::sync::Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Channel for MockChannel {
        fn name(&self) -> &str {
            &self.name
        }

        fn id(&self) -> &ChannelId {
            &self.channel_id
        }

        async fn start(
            &self,
        ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
            self.started.store(true, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(4);
            *self.inbound.lock().await = Some(tx);
            Ok(rx)
        }

        async fn send(&self, chat_id: &str, message: &OutboundMessage) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(format!("{chat_id}:{}", message.text));
            Ok(())
        }

        async fn send_document(
            &self,
            chat_id: &str,
            document: &OutboundDocument,
        ) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(format!("{chat_id}:{}", document.file_name));
            Ok(())
        }

        fn is_allowed(&self, _sender_id: &str) -> bool {
            true
        }

        async fn stop(&self) -> Result<(), ChannelError> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn health_check(&self) -> Result<bool, ChannelError> {
            Ok(self.started.load(Ordering::SeqCst))
        }
    }

    #[test]
    fn empty_registry() {
        let reg = ChannelRegistry::new();
        assert!(reg.is_empty());
        assert!(reg.get("telegram").is_none());
    }

    #[test]
    fn register_and_list() {
        let mut reg = ChannelRegistry::new();
        reg.register(Arc::new(MockChannel::new("telegram")));
        reg.register(Arc::new(MockChannel::new("cli")));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.list(), vec!["cli", "telegram"]);
    }

    #[tokio::test]
    async fn start_all_merges_streams() {
        let mut reg = ChannelRegistry::new();
        let ch = Arc::new(MockChannel::new("test"));
        reg.register(ch.clone());

        let mut rx = reg.start_all().await.unwrap();
        assert!(ch.started.load(Ordering::SeqCst));

        let tx = ch.inbound.lock().await.clone().unwrap();
        tx.send(Ok(ChannelMessage {
            channel_id: ChannelId("test".into()),
            sender_id: "1".into(),
            sender_name: None,
            chat_id: "1".into(),
            kind: InboundKind::Text { text: "5".into() },
        }))
        .await
        .unwrap();

        let (name, msg) = rx.recv().await.unwrap();
        assert_eq!(name, "test");
        assert_eq!(msg.unwrap().sender_id, "1");
    }

    #[tokio::test]
    async fn stop_and_health() {
        let mut reg = ChannelRegistry::new();
        let ch = Arc::new(MockChannel::new("test"));
        reg.register(ch.clone());

        assert_eq!(reg.health_check_all().await.get("test"), Some(&false));
        let _rx = reg.start_all().await.unwrap();
        assert_eq!(reg.health_check_all().await.get("test"), Some(&true));

        reg.stop_all().await;
        assert!(ch.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn routes_replies_by_channel_name() {
        let mut reg = ChannelRegistry::new();
        let ch = Arc::new(MockChannel::new("test"));
        reg.register(ch.clone());

        reg.send_to("test", "chat1", &OutboundMessage::text("Hello"))
            .await
            .unwrap();
        reg.send_document_to(
            "test",
            "chat1",
            &OutboundDocument {
                path: "/tmp/a.csv".into(),
                file_name: "Updated_Attendance.csv".into(),
                caption: None,
            },
        )
        .await
        .unwrap();
        assert!(reg.acknowledge_on("test", "cb").await.is_ok());
        assert!(
            reg.send_to("nonexistent", "chat1", &OutboundMessage::text("x"))
                .await
                .is_err()
        );

        assert_eq!(
            *ch.sent.lock().unwrap(),
            vec!["chat1:Hello", "chat1:Updated_Attendance.csv"]
        );
    }
}
