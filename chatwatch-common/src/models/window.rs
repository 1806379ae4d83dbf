// File: chatwatch-common/src/models/window.rs

use serde::{Deserialize, Serialize};

/// Which of the two chat buffers a message lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferKind {
    /// Rendered messages.
    Visible,
    /// Messages held back while the viewport is scrolled up.
    Pending,
}

/// Tunables for one chat window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatWindowConfig {
    /// Max messages kept in each of `visible` and `pending`.
    pub capacity: usize,
    /// Distance from the bottom (in px-equivalent units) still counted as pinned.
    pub scroll_threshold: f64,
    /// How long a highlighted match stays flagged.
    pub highlight_retention_ms: u64,
    /// How often watch match counts are recomputed.
    pub recount_interval_ms: u64,
    /// Shortest watch pattern accepted, in chars, after trimming.
    pub min_pattern_len: usize,
}

impl Default for ChatWindowConfig {
    fn default() -> Self {
        Self {
            capacity: 150,
            scroll_threshold: 150.0,
            highlight_retention_ms: 20_000,
            recount_interval_ms: 10_000,
            min_pattern_len: 2,
        }
    }
}
