// File: chatwatch-common/src/models/watch.rs

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::chat::{ChatMessage, MessageKey};

/// A watch pattern plus its last computed match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntry {
    pub pattern: String,
    pub match_count: usize,
}

/// A buffered message that matched one or more watch patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightedMatch {
    pub key: MessageKey,
    pub message: ChatMessage,
    pub patterns: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Read-only view of the watch subsystem for the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchState {
    /// Sorted by pattern.
    pub entries: Vec<WatchEntry>,
    /// Oldest first.
    pub highlights: Vec<HighlightedMatch>,
    /// Messages waiting for the viewport to return to the bottom.
    pub pending_count: usize,
}
