//! Channel trait — the abstraction over chat transports.
//!
//! A Channel connects Tallygram to a messaging platform (Telegram, an
//! in-process test harness, etc.). It delivers text and button-press events
//! from users and sends rendered prompts back. The engine treats these as
//! opaque send/receive primitives; button layouts and emoji are
//! presentation, not behavior.

use crate::error::ChannelError;
use crate::measurement::UserId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An event delivered by a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEvent {
    /// Channel-provided stable user identity.
    pub user_id: UserId,

    /// Human-readable sender name (if the platform exposes one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    pub kind: EventKind,

    /// Reference to the message this event originated from, for edits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_ref: Option<String>,
}

/// What the user did.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A plain text message (commands included, unparsed).
    Text(String),

    /// An inline-button press carrying its action token.
    Action(String),
}

/// A single inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub action: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// Rows of inline buttons attached to an outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, polling or
/// webhooks, and payload parsing.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "telegram", "local").
    fn name(&self) -> &str;

    /// Start listening for incoming events.
    ///
    /// Returns a receiver that yields events. The implementation handles
    /// polling or webhook plumbing internally. Events for the same user are
    /// delivered sequentially.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelEvent, ChannelError>>,
        ChannelError,
    >;

    /// Send a message to a user, optionally with inline buttons.
    async fn send(
        &self,
        user_id: &UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> std::result::Result<(), ChannelError>;

    /// Edit a previously sent message in place.
    async fn edit(
        &self,
        user_id: &UserId,
        message_ref: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> std::result::Result<(), ChannelError> {
        // Platforms without edit support fall back to a fresh message.
        let _ = message_ref;
        self.send(user_id, text, keyboard).await
    }

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }
}
