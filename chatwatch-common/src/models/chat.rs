// File: chatwatch-common/src/models/chat.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who sent a chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAuthor {
    pub username: String,
    #[serde(default)]
    pub display_color: Option<String>,
}

impl ChatAuthor {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            display_color: None,
        }
    }
}

/// An emote occurrence inside a message.
///
/// `start_index..end_index` is a half-open range of *char* offsets into the
/// message text (Twitch counts code points, not bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emote {
    pub id: String,
    pub name: String,
    pub image_ref: String,
    pub start_index: usize,
    pub end_index: usize,
}

/// A single inbound chat message, as delivered by a push-stream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub channel: String,
    pub author: ChatAuthor,
    pub text: String,
    #[serde(default)]
    pub emotes: Vec<Emote>,
    /// Filled in at ingestion time when the source did not supply one.
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

/// Identity of a message for dedup and highlight bookkeeping.
/// Sources do not give us a message id, so this is the best we have.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    pub username: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(channel: &str, username: &str, text: &str) -> Self {
        Self {
            channel: channel.to_string(),
            author: ChatAuthor::new(username),
            text: text.to_string(),
            emotes: Vec::new(),
            received_at: None,
        }
    }

    pub fn with_received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = Some(at);
        self
    }

    /// `None` until the message has been stamped by ingestion.
    pub fn key(&self) -> Option<MessageKey> {
        self.received_at.map(|received_at| MessageKey {
            username: self.author.username.clone(),
            text: self.text.clone(),
            received_at,
        })
    }

    /// The line watch patterns are matched against: `"username: text"`, lowercased.
    pub fn watch_line(&self) -> String {
        format!("{}: {}", self.author.username, self.text).to_lowercase()
    }
}
