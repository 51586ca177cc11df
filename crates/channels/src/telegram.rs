//! Telegram channel adapter.
//!
//! Talks to the Telegram Bot API directly over `reqwest` using long polling:
//! a background task calls `getUpdates` with the last confirmed offset, maps
//! each update to a [`ChannelEvent`], and forwards it over an mpsc channel.
//! Telegram delivers updates for one chat in order, which is the sequencing
//! guarantee the engine relies on.
//!
//! Methods used:
//! - `getUpdates` — long-poll for messages and button presses
//! - `sendMessage` — send text, optionally with an inline keyboard
//! - `editMessageText` — rewrite a previously sent message
//! - `answerCallbackQuery` — dismiss the client-side button spinner

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tallygram_core::channel::{Channel, ChannelEvent, EventKind, Keyboard};
use tallygram_core::error::ChannelError;
use tallygram_core::measurement::UserId;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Telegram Bot API channel.
pub struct TelegramChannel {
    base_url: String,
    bot_token: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
    running: Arc<AtomicBool>,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("base_url", &self.base_url)
            .field("bot_token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

// --- Bot API payloads (the subset this adapter reads) ---

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    #[serde(default)]
    from: Option<User>,
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    data: Option<String>,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            // Long-poll requests block up to poll_timeout; leave headroom.
            .timeout(std::time::Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: DEFAULT_BASE_URL.into(),
            bot_token: bot_token.into(),
            poll_timeout_secs: 30,
            client,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use a custom API base URL (testing, local Bot API server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Long-poll timeout handed to `getUpdates`.
    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    /// Map one Bot API update to a channel event. Updates with nothing the
    /// engine can act on (joins, edits, stickers) map to `None`.
    fn event_from_update(update: &Update) -> Option<ChannelEvent> {
        if let Some(cb) = &update.callback_query {
            let message = cb.message.as_ref()?;
            let data = cb.data.clone()?;
            return Some(ChannelEvent {
                user_id: UserId(message.chat.id.to_string()),
                sender_name: cb.from.as_ref().and_then(|u| u.first_name.clone()),
                kind: EventKind::Action(data),
                message_ref: Some(message.message_id.to_string()),
            });
        }

        let message = update.message.as_ref()?;
        let text = message.text.clone()?;
        Some(ChannelEvent {
            user_id: UserId(message.chat.id.to_string()),
            sender_name: message.from.as_ref().and_then(|u| u.first_name.clone()),
            kind: EventKind::Text(text),
            message_ref: Some(message.message_id.to_string()),
        })
    }

    /// Render a [`Keyboard`] as Telegram `reply_markup` JSON.
    fn reply_markup(keyboard: &Keyboard) -> serde_json::Value {
        let rows: Vec<Vec<serde_json::Value>> = keyboard
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| {
                        serde_json::json!({
                            "text": b.label,
                            "callback_data": b.action,
                        })
                    })
                    .collect()
            })
            .collect();
        serde_json::json!({ "inline_keyboard": rows })
    }

    async fn call(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, ChannelError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionLost(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(method = %method, status = %status, body = %text, "Telegram API error");
            return Err(ChannelError::InvalidPayload(format!(
                "{method} returned HTTP {status}"
            )));
        }
        Ok(response)
    }

    async fn acknowledge_callback(&self, callback_id: &str) {
        let body = serde_json::json!({ "callback_query_id": callback_id });
        if let Err(e) = self.call("answerCallbackQuery", body).await {
            debug!(error = %e, "Callback acknowledgement failed");
        }
    }

    async fn poll_once(&self, offset: i64) -> Result<Vec<Update>, ChannelError> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        let response = self.call("getUpdates", body).await?;
        let parsed: UpdatesResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(e.to_string()))?;
        if !parsed.ok {
            return Err(ChannelError::InvalidPayload(
                "getUpdates returned ok=false".into(),
            ));
        }
        Ok(parsed.result)
    }

    async fn poll_loop(
        self: Arc<Self>,
        tx: mpsc::Sender<Result<ChannelEvent, ChannelError>>,
    ) {
        let mut offset: i64 = 0;
        while self.running.load(Ordering::SeqCst) {
            let updates = match self.poll_once(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "Telegram poll failed, backing off");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);

                if let Some(cb) = &update.callback_query {
                    self.acknowledge_callback(&cb.id).await;
                }

                let Some(event) = Self::event_from_update(&update) else {
                    debug!(update_id = update.update_id, "Skipping unsupported update");
                    continue;
                };

                if tx.send(Ok(event)).await.is_err() {
                    info!("Event receiver dropped, stopping Telegram poll loop");
                    self.running.store(false, Ordering::SeqCst);
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelEvent, ChannelError>>, ChannelError> {
        if self.bot_token.is_empty() {
            return Err(ChannelError::NotConfigured("telegram bot token".into()));
        }

        info!(poll_timeout = self.poll_timeout_secs, "Telegram channel starting");
        let (tx, rx) = mpsc::channel(64);
        self.running.store(true, Ordering::SeqCst);

        let poller = Arc::new(Self {
            base_url: self.base_url.clone(),
            bot_token: self.bot_token.clone(),
            poll_timeout_secs: self.poll_timeout_secs,
            client: self.client.clone(),
            running: self.running.clone(),
        });
        tokio::spawn(poller.poll_loop(tx));

        Ok(rx)
    }

    async fn send(
        &self,
        user_id: &UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": user_id.0,
            "text": text,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = Self::reply_markup(kb);
        }

        self.call("sendMessage", body).await.map_err(|e| {
            ChannelError::DeliveryFailed {
                user_id: user_id.0.clone(),
                reason: e.to_string(),
            }
        })?;
        debug!(user_id = %user_id, chars = text.len(), "Telegram message sent");
        Ok(())
    }

    async fn edit(
        &self,
        user_id: &UserId,
        message_ref: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": user_id.0,
            "message_id": message_ref.parse::<i64>().map_err(|_| {
                ChannelError::InvalidPayload(format!("Bad message ref: {message_ref}"))
            })?,
            "text": text,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = Self::reply_markup(kb);
        }

        // "message is not modified" comes back as 400; resending is the
        // harmless fallback in that case too.
        if self.call("editMessageText", body).await.is_err() {
            return self.send(user_id, text, keyboard).await;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Telegram channel stopping");
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
