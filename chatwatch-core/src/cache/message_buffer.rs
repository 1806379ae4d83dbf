// File: src/cache/message_buffer.rs

use std::collections::VecDeque;

use tracing::trace;

use crate::models::{BufferKind, ChatMessage};

/// The two bounded message buffers behind a chat window.
///
/// `visible` holds what is rendered, `pending` holds what arrived while the
/// viewport was scrolled away from the bottom. Both are capped at the same
/// `capacity` and trimmed strictly FIFO from the head.
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    visible: VecDeque<ChatMessage>,
    pending: VecDeque<ChatMessage>,
    capacity: usize,
}

impl MessageBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            visible: VecDeque::with_capacity(capacity.min(1024)),
            pending: VecDeque::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self, kind: BufferKind) -> usize {
        self.buffer(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty() && self.pending.is_empty()
    }

    /// Appends to one buffer and trims it. Returns how many messages were evicted.
    pub fn append(&mut self, kind: BufferKind, msg: ChatMessage) -> usize {
        let capacity = self.capacity;
        let buf = self.buffer_mut(kind);
        buf.push_back(msg);
        trim_front(buf, capacity)
    }

    /// Moves everything in `pending` onto the end of `visible`, in order,
    /// then trims `visible`. Returns how many messages were moved.
    pub fn flush_pending_into_visible(&mut self) -> usize {
        let moved = self.pending.len();
        if moved == 0 {
            return 0;
        }
        self.visible.extend(self.pending.drain(..));
        let evicted = trim_front(&mut self.visible, self.capacity);
        trace!("flushed {} pending message(s), evicted {}", moved, evicted);
        moved
    }

    pub fn reset(&mut self) {
        self.visible.clear();
        self.pending.clear();
    }

    pub fn snapshot(&self, kind: BufferKind) -> Vec<ChatMessage> {
        self.buffer(kind).iter().cloned().collect()
    }

    pub fn iter(&self, kind: BufferKind) -> impl Iterator<Item = &ChatMessage> {
        self.buffer(kind).iter()
    }

    /// Every buffered message, visible first, then pending.
    pub fn iter_all(&self) -> impl Iterator<Item = &ChatMessage> {
        self.visible.iter().chain(self.pending.iter())
    }

    fn buffer(&self, kind: BufferKind) -> &VecDeque<ChatMessage> {
        match kind {
            BufferKind::Visible => &self.visible,
            BufferKind::Pending => &self.pending,
        }
    }

    fn buffer_mut(&mut self, kind: BufferKind) -> &mut VecDeque<ChatMessage> {
        match kind {
            BufferKind::Visible => &mut self.visible,
            BufferKind::Pending => &mut self.pending,
        }
    }
}

fn trim_front(buf: &mut VecDeque<ChatMessage>, capacity: usize) -> usize {
    let excess = buf.len().saturating_sub(capacity);
    if excess > 0 {
        buf.drain(..excess);
    }
    excess
}
