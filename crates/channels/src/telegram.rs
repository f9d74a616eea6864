//! Telegram channel over the Bot API.
//!
//! Updates arrive either by long polling `getUpdates` or, in webhook mode,
//! through [`TelegramChannel::inject_update`], which the HTTP gateway calls
//! for every POST it receives. Replies go out through `sendMessage`,
//! artifacts through a multipart `sendDocument`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use rollcall_config::{TelegramMode, TelegramSettings};
use rollcall_core::channel::{
    Channel, ChannelId, ChannelMessage, InboundKind, OutboundDocument, OutboundMessage,
};
use rollcall_core::error::ChannelError;
use rollcall_core::session::SessionMode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::inbound::classify;
use crate::render::{ADD_ABSENT_DATA, ADD_ABSENT_LABEL, NEW_ABSENT_DATA, NEW_ABSENT_LABEL};

/// Telegram's per-message text limit, in UTF-16 code units.
const MAX_MESSAGE_LEN: usize = 4096;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// Allowed user IDs or usernames. Empty = deny all, ["*"] = allow all.
    pub allowed_users: Vec<String>,
    /// Whether to use webhook mode instead of long polling.
    pub use_webhook: bool,
    /// Public base URL; the webhook is registered at `<public_url>/telegram`.
    pub public_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub poll_timeout_secs: u64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("allowed_users", &self.allowed_users)
            .field("use_webhook", &self.use_webhook)
            .field("public_url", &self.public_url)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl From<&TelegramSettings> for TelegramConfig {
    fn from(settings: &TelegramSettings) -> Self {
        Self {
            bot_token: settings.bot_token.clone().unwrap_or_default(),
            allowed_users: settings.allowed_users.clone(),
            use_webhook: settings.mode == TelegramMode::Webhook,
            public_url: settings.public_url.clone(),
            webhook_secret: settings.webhook_secret.clone(),
            api_base: settings.api_base.clone(),
            poll_timeout_secs: settings.poll_timeout_secs,
        }
    }
}

// --- Bot API wire types (only the fields rollcall reads) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

fn failed(reason: impl Into<String>) -> ChannelError {
    ChannelError::DeliveryFailed {
        channel: "telegram".into(),
        reason: reason.into(),
    }
}

/// Thin Bot API client. Errors never include the request URL, which
/// carries the token.
#[derive(Clone)]
struct BotApi {
    client: reqwest::Client,
    base: String,
}

impl BotApi {
    fn new(api_base: &str, token: &str) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T, ChannelError> {
        let mut request = self.client.post(self.url(method)).json(&body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|e| failed(format!("{method}: {}", e.without_url())))?;
        Self::decode(method, response).await
    }

    async fn decode<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, ChannelError> {
        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| failed(format!("{method}: HTTP {status}: {}", e.without_url())))?;
        if !body.ok {
            let reason = body.description.unwrap_or_else(|| format!("HTTP {status}"));
            return Err(failed(format!("{method}: {reason}")));
        }
        body.result
            .ok_or_else(|| failed(format!("{method}: response has no result")))
    }

    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, ChannelError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }),
            Some(Duration::from_secs(timeout_secs + 10)),
        )
        .await
    }

    async fn send_document(
        &self,
        chat_id: &str,
        document: &OutboundDocument,
    ) -> Result<(), ChannelError> {
        let bytes = tokio::fs::read(&document.path)
            .await
            .map_err(|e| failed(format!("reading {}: {e}", document.path.display())))?;
        let part = Part::bytes(bytes)
            .file_name(document.file_name.clone())
            .mime_str("text/csv")
            .map_err(|e| failed(e.without_url().to_string()))?;
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);
        if let Some(caption) = &document.caption {
            form = form.text("caption", caption.clone());
        }

        let response = self
            .client
            .post(self.url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| failed(format!("sendDocument: {}", e.without_url())))?;
        Self::decode::<serde_json::Value>("sendDocument", response)
            .await
            .map(|_| ())
    }
}

fn allowed(list: &[String], sender: &str) -> bool {
    if list.is_empty() {
        return false;
    }
    list.iter().any(|u| u == "*" || u == sender)
}

fn user_allowed(list: &[String], user: &User) -> bool {
    allowed(list, &user.id.to_string())
        || user
            .username
            .as_deref()
            .is_some_and(|name| allowed(list, name) || allowed(list, &format!("@{name}")))
}

/// Convert a Bot API update into a channel message.
///
/// Returns `None` for updates rollcall does not act on (stickers, edits,
/// unknown button payloads) and an `Unauthorized` error for senders outside
/// the allowlist.
fn convert_update(
    channel_id: &ChannelId,
    allowlist: &[String],
    update: Update,
) -> Option<Result<ChannelMessage, ChannelError>> {
    let (user, chat_id, kind) = if let Some(query) = update.callback_query {
        let mode = query.data.as_deref()?.parse::<SessionMode>().ok()?;
        let chat_id = query
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(query.from.id);
        let kind = InboundKind::ModeSelected {
            mode,
            callback_id: Some(query.id),
        };
        (query.from, chat_id, kind)
    } else {
        let message = update.message?;
        let text = message.text?;
        (message.from?, message.chat.id, classify(&text))
    };

    if !user_allowed(allowlist, &user) {
        warn!(sender = user.id, username = ?user.username, "Telegram sender not in allowlist");
        return Some(Err(ChannelError::Unauthorized {
            channel: channel_id.0.clone(),
            sender_id: user.id.to_string(),
        }));
    }

    let sender_name = match user.username {
        Some(username) => Some(username),
        None if !user.first_name.is_empty() => Some(user.first_name),
        None => None,
    };
    Some(Ok(ChannelMessage {
        channel_id: channel_id.clone(),
        sender_id: user.id.to_string(),
        sender_name,
        chat_id: chat_id.to_string(),
        kind,
    }))
}

async fn poll_updates(
    api: BotApi,
    channel_id: ChannelId,
    allowlist: Vec<String>,
    timeout_secs: u64,
    tx: mpsc::Sender<Result<ChannelMessage, ChannelError>>,
) {
    let mut offset = 0;
    let mut backoff = INITIAL_BACKOFF;

    while !tx.is_closed() {
        match api.get_updates(offset, timeout_secs).await {
            Ok(updates) => {
                backoff = INITIAL_BACKOFF;
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(msg) = convert_update(&channel_id, &allowlist, update) else {
                        continue;
                    };
                    if tx.send(msg).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, retry_in = ?backoff, "Telegram polling failed");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
    debug!("Telegram polling stopped");
}

/// Split text into chunks Telegram accepts, preferring line breaks.
/// Lengths are UTF-16 code units.
fn split_text(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.encode_utf16().count();
        if current_len > 0 && current_len + 1 + line_len > max {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max {
            for c in line.chars() {
                let width = c.len_utf16();
                if current_len > 0 && current_len + width > max {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.push(c);
                current_len += width;
            }
            continue;
        }
        if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }
    chunks.push(current);
    chunks
}

fn mode_keyboard() -> serde_json::Value {
    json!({
        "inline_keyboard": [[
            { "text": ADD_ABSENT_LABEL, "callback_data": ADD_ABSENT_DATA },
            { "text": NEW_ABSENT_LABEL, "callback_data": NEW_ABSENT_DATA },
        ]]
    })
}

/// Telegram channel adapter.
pub struct TelegramChannel {
    config: TelegramConfig,
    channel_id: ChannelId,
    api: BotApi,
    /// Sender for updates arriving through the webhook (or injected in tests).
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
    poller: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        let api = BotApi::new(&config.api_base, &config.bot_token);
        Self {
            config,
            channel_id: ChannelId("telegram".into()),
            api,
            inject_tx: tokio::sync::Mutex::new(None),
            poller: tokio::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    /// Feed one Bot API update into the channel's inbound stream.
    pub async fn inject_update(&self, update: Update) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        let Some(tx) = guard.as_ref() else {
            return Err(ChannelError::ConnectionLost("Channel not started".into()));
        };
        let update_id = update.update_id;
        match convert_update(&self.channel_id, &self.config.allowed_users, update) {
            Some(msg) => tx
                .send(msg)
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into())),
            None => {
                debug!(update_id, "Ignoring Telegram update");
                Ok(())
            }
        }
    }

    /// The bot's own account, via `getMe`.
    pub async fn bot_identity(&self) -> Result<User, ChannelError> {
        self.api.call("getMe", json!({}), None).await
    }

    async fn register_webhook(&self) -> Result<(), ChannelError> {
        let base = self.config.public_url.as_deref().ok_or_else(|| {
            ChannelError::NotConfigured("telegram webhook mode needs a public_url".into())
        })?;
        let url = format!("{}/telegram", base.trim_end_matches('/'));
        let mut body = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(secret) = &self.config.webhook_secret {
            body["secret_token"] = json!(secret);
        }
        self.api.call::<bool>("setWebhook", body, None).await?;
        info!(url = %url, "Telegram webhook registered");
        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        if self.config.bot_token.is_empty() {
            return Err(ChannelError::NotConfigured("telegram bot token is not set".into()));
        }
        let (tx, rx) = mpsc::channel(64);

        if self.config.use_webhook {
            self.register_webhook().await?;
        } else {
            // getUpdates is refused while a webhook is set
            if let Err(e) = self
                .api
                .call::<bool>("deleteWebhook", json!({}), None)
                .await
            {
                warn!(error = %e, "Could not clear Telegram webhook");
            }
            let handle = tokio::spawn(poll_updates(
                self.api.clone(),
                self.channel_id.clone(),
                self.config.allowed_users.clone(),
                self.config.poll_timeout_secs,
                tx.clone(),
            ));
            *self.poller.lock().await = Some(handle);
            info!(timeout_secs = self.config.poll_timeout_secs, "Telegram long polling started");
        }

        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(&self, chat_id: &str, message: &OutboundMessage) -> Result<(), ChannelError> {
        let chunks = split_text(&message.text, MAX_MESSAGE_LEN);
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let mut body = json!({ "chat_id": chat_id, "text": chunk });
            if message.offer_modes && i == last {
                body["reply_markup"] = mode_keyboard();
            }
            self.api
                .call::<serde_json::Value>("sendMessage", body, None)
                .await?;
        }
        debug!(chat_id = %chat_id, len = message.text.len(), "Telegram message sent");
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: &str,
        document: &OutboundDocument,
    ) -> Result<(), ChannelError> {
        self.api.send_document(chat_id, document).await?;
        info!(chat_id = %chat_id, file = %document.file_name, "Telegram document sent");
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.api
            .call::<bool>(
                "answerCallbackQuery",
                json!({ "callback_query_id": callback_id }),
                None,
            )
            .await
            .map(|_| ())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        allowed(&self.config.allowed_users, sender_id)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Telegram channel stopping");
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
        *self.inject_tx.lock().await = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        if self.config.bot_token.is_empty() {
            return Ok(false);
        }
        Ok(self.bot_identity().await.is_ok())
    }
}
