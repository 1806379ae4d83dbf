// File: src/services/ingestion_pipeline.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::cache::MessageBuffer;
use crate::eventbus::{InvalidationReason, Notifier, RenderSignal};
use crate::models::{BufferKind, ChatMessage, ChatWindowConfig, WatchState};
use crate::services::scroll_gate::{ScrollGate, ScrollTransition};
use crate::services::watch_list::WatchListIndex;
use crate::utils::emotes::normalize_emotes;
use crate::utils::time::{millis, Clock, SystemClock};

/// Coordinates one chat window: routes inbound messages through the scroll
/// gate into the right buffer, runs watch evaluation, and tells the
/// presentation layer when to redraw.
///
/// Every method is a discrete handler that runs to completion; the pipeline
/// is meant to be owned by a single event loop (see
/// [`crate::tasks::chat_window`]).
pub struct IngestionPipeline {
    config: ChatWindowConfig,
    buffer: MessageBuffer,
    gate: ScrollGate,
    watch: WatchListIndex,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    channel: Option<String>,
}

impl IngestionPipeline {
    pub fn new(config: ChatWindowConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ChatWindowConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            buffer: MessageBuffer::new(config.capacity),
            gate: ScrollGate::new(config.scroll_threshold),
            watch: WatchListIndex::new(
                millis(config.highlight_retention_ms),
                config.min_pattern_len,
            ),
            notifier: Notifier::new(),
            clock,
            channel: None,
            config,
        }
    }

    pub fn config(&self) -> &ChatWindowConfig {
        &self.config
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Handles one inbound message. Returns the buffer it landed in, or
    /// `None` if it belonged to another channel.
    pub fn on_message(&mut self, mut msg: ChatMessage) -> Option<BufferKind> {
        if !self.accepts_channel(&msg.channel) {
            debug!(
                "dropping message for #{} while watching #{}",
                msg.channel,
                self.channel.as_deref().unwrap_or_default()
            );
            return None;
        }

        let now = self.clock.now();
        if msg.received_at.is_none() {
            msg.received_at = Some(now);
        }
        normalize_emotes(&msg.text, &mut msg.emotes);

        let kind = if self.gate.is_pinned() {
            BufferKind::Visible
        } else {
            BufferKind::Pending
        };

        let matched = self.watch.evaluate(&msg, now);
        if !matched.is_empty() {
            trace!("message from {} matched {:?}", msg.author.username, matched);
        }

        let evicted = self.buffer.append(kind, msg);
        if evicted > 0 {
            trace!("{:?} buffer over capacity, evicted {}", kind, evicted);
        }

        if kind == BufferKind::Visible {
            self.notifier.notify(InvalidationReason::Appended);
        }
        Some(kind)
    }

    /// Feeds a scroll sample to the gate; on the pinned edge, pending
    /// messages are merged into the visible buffer.
    pub fn report_scroll_position(
        &mut self,
        scroll_top: f64,
        scroll_height: f64,
        client_height: f64,
    ) -> ScrollTransition {
        let transition = self
            .gate
            .report_scroll_position(scroll_top, scroll_height, client_height);
        match transition {
            ScrollTransition::Pinned => {
                let moved = self.buffer.flush_pending_into_visible();
                debug!("viewport pinned again, flushed {} pending message(s)", moved);
                self.notifier.notify(InvalidationReason::Flushed);
            }
            ScrollTransition::Unpinned => {
                debug!("viewport scrolled away, queueing new messages");
            }
            ScrollTransition::Unchanged => {}
        }
        transition
    }

    pub fn is_pinned(&self) -> bool {
        self.gate.is_pinned()
    }

    /// Adds a watch pattern and flags already-buffered messages it matches.
    pub fn add_pattern(&mut self, pattern: &str) -> bool {
        if !self.watch.add_pattern(pattern) {
            return false;
        }
        let now = self.clock.now();
        let hits = self.watch.retro_match(pattern, self.buffer.iter_all(), now);
        debug!("pattern {:?} added, {} retroactive match(es)", pattern.trim(), hits);
        self.notifier.notify(InvalidationReason::WatchChanged);
        true
    }

    pub fn remove_pattern(&mut self, pattern: &str) -> bool {
        let removed = self.watch.remove_pattern(pattern);
        if removed {
            self.notifier.notify(InvalidationReason::WatchChanged);
        }
        removed
    }

    /// Removes the pattern if it is watched, adds it otherwise. Returns
    /// whether the pattern is watched afterwards.
    pub fn toggle_pattern(&mut self, pattern: &str) -> bool {
        if self.watch.contains_pattern(pattern) {
            self.remove_pattern(pattern);
            false
        } else {
            self.add_pattern(pattern)
        }
    }

    /// Clears everything for a new channel and starts following it.
    pub fn switch_channel(&mut self, channel: &str) {
        let channel = normalize_channel(channel);
        info!("switching chat window to #{}", channel);
        self.channel = Some(channel);
        self.gate.repin();
        self.reset();
    }

    /// Empties both buffers and cancels every highlight.
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.watch.reset();
        self.notifier.notify(InvalidationReason::Reset);
    }

    /// Periodic recount of watch matches over the buffered window.
    pub fn recount(&mut self) -> BTreeMap<String, usize> {
        let before: Vec<usize> = self.watch.entries().iter().map(|e| e.match_count).collect();
        let counts = self.watch.recount(self.buffer.iter_all());
        if counts.values().copied().ne(before) {
            self.notifier.notify(InvalidationReason::WatchChanged);
        }
        counts
    }

    /// Drops highlights whose retention has elapsed.
    pub fn expire_due(&mut self) -> usize {
        let now = self.clock.now();
        let expired = self.watch.expire_due(now);
        if expired > 0 {
            self.notifier.notify(InvalidationReason::WatchChanged);
        }
        expired
    }

    pub fn next_expiry(&self) -> Option<DateTime<Utc>> {
        self.watch.next_expiry()
    }

    /// Rendered messages, oldest first.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.buffer.snapshot(BufferKind::Visible)
    }

    pub fn pending_snapshot(&self) -> Vec<ChatMessage> {
        self.buffer.snapshot(BufferKind::Pending)
    }

    pub fn pending_count(&self) -> usize {
        self.buffer.len(BufferKind::Pending)
    }

    pub fn watch_state(&self) -> WatchState {
        WatchState {
            entries: self.watch.entries(),
            highlights: self.watch.highlights(),
            pending_count: self.pending_count(),
        }
    }

    pub fn watch_list(&self) -> &WatchListIndex {
        &self.watch
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RenderSignal> {
        self.notifier.subscribe()
    }

    pub fn current_signal(&self) -> Option<RenderSignal> {
        self.notifier.current()
    }

    /// Tears the window down: buffers and highlights are cleared and every
    /// subscriber stream is closed.
    pub fn dispose(&mut self) {
        self.buffer.reset();
        self.watch.clear_highlights();
        self.notifier.close();
    }

    fn accepts_channel(&self, channel: &str) -> bool {
        match &self.channel {
            Some(current) => normalize_channel(channel) == *current,
            None => true,
        }
    }
}

/// `#SomeChannel` and `somechannel` are the same channel.
pub fn normalize_channel(channel: &str) -> String {
    channel.trim().trim_start_matches('#').to_lowercase()
}
