//! In-process channel for tests and dry runs.
//!
//! Events are injected programmatically and every outgoing message is
//! captured, so engine behavior can be exercised end to end without a
//! network.

use async_trait::async_trait;
use tallygram_core::channel::{Channel, ChannelEvent, EventKind, Keyboard};
use tallygram_core::error::ChannelError;
use tallygram_core::measurement::UserId;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// One captured outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub user_id: UserId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

pub struct LocalChannel {
    inject_tx: Mutex<Option<mpsc::Sender<Result<ChannelEvent, ChannelError>>>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self {
            inject_tx: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Inject an event as if a user had sent it. Fails if the channel has
    /// not been started.
    pub async fn inject(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        match guard.as_ref() {
            Some(tx) => tx
                .send(Ok(event))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Event receiver closed".into())),
            None => Err(ChannelError::NotConfigured("local channel not started".into())),
        }
    }

    /// Inject a plain text message from the given user.
    pub async fn inject_text(
        &self,
        user_id: impl Into<UserId>,
        text: impl Into<String>,
    ) -> Result<(), ChannelError> {
        self.inject(ChannelEvent {
            user_id: user_id.into(),
            sender_name: None,
            kind: EventKind::Text(text.into()),
            message_ref: None,
        })
        .await
    }

    /// All messages sent so far, oldest first.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// The most recent outgoing message, if any.
    pub async fn last_sent(&self) -> Option<SentMessage> {
        self.sent.lock().await.last().cloned()
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for LocalChannel {
    fn name(&self) -> &str {
        "local"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelEvent, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(
        &self,
        user_id: &UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        debug!(user_id = %user_id, chars = text.len(), "Local send");
        self.sent.lock().await.push(SentMessage {
            user_id: user_id.clone(),
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        *self.inject_tx.lock().await = None;
        Ok(())
    }
}
