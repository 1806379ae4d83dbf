//! src/eventbus/mod.rs
//!
//! Render-invalidation fan-out for the presentation layer.
//!
//! Every subscriber gets its own unbounded queue, so signals arrive in
//! emission order and a slow reader never stalls ingestion. Late
//! subscribers only see signals emitted after they subscribed; the most
//! recent signal is available from [`Notifier::current`].

use tokio::sync::mpsc;
use tracing::trace;

/// Why the presentation layer should redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// A message was appended to the visible buffer.
    Appended,
    /// Pending messages were merged into the visible buffer.
    Flushed,
    /// Buffers and highlights were cleared (channel switch or reset).
    Reset,
    /// Patterns, counts or highlights changed.
    WatchChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSignal {
    /// Monotonic per notifier, starting at 1.
    pub generation: u64,
    pub reason: InvalidationReason,
}

#[derive(Debug, Default)]
pub struct Notifier {
    subscribers: Vec<mpsc::UnboundedSender<RenderSignal>>,
    current: Option<RenderSignal>,
    generation: u64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver for every signal emitted from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RenderSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Emits a signal to every live subscriber, dropping the ones whose
    /// receiver has gone away.
    pub fn notify(&mut self, reason: InvalidationReason) -> RenderSignal {
        self.generation += 1;
        let signal = RenderSignal {
            generation: self.generation,
            reason,
        };
        self.subscribers.retain(|tx| tx.send(signal).is_ok());
        self.current = Some(signal);
        trace!("render signal {:?} -> {} subscriber(s)", signal, self.subscribers.len());
        signal
    }

    /// The last signal emitted, if any.
    pub fn current(&self) -> Option<RenderSignal> {
        self.current
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Drops every subscriber; their receivers see the stream end.
    pub fn close(&mut self) {
        self.subscribers.clear();
    }
}
