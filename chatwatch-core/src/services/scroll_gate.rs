// File: src/services/scroll_gate.rs

/// What a scroll sample did to the pinned state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTransition {
    Unchanged,
    /// Not pinned -> pinned. The caller should flush pending messages.
    Pinned,
    /// Pinned -> not pinned. New messages start queueing.
    Unpinned,
}

/// Tracks whether the chat viewport is sitting at the bottom of the list.
///
/// Purely a function of the latest sample and the previous state; sampling
/// rate is the caller's business.
#[derive(Debug, Clone)]
pub struct ScrollGate {
    threshold: f64,
    pinned: bool,
}

impl ScrollGate {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            pinned: true,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn report_scroll_position(
        &mut self,
        scroll_top: f64,
        scroll_height: f64,
        client_height: f64,
    ) -> ScrollTransition {
        let distance_from_bottom = scroll_height - (scroll_top + client_height);
        let now_pinned = distance_from_bottom <= self.threshold;
        let transition = match (self.pinned, now_pinned) {
            (false, true) => ScrollTransition::Pinned,
            (true, false) => ScrollTransition::Unpinned,
            _ => ScrollTransition::Unchanged,
        };
        self.pinned = now_pinned;
        transition
    }

    /// Forces the pinned state back on, e.g. after a channel switch.
    pub fn repin(&mut self) {
        self.pinned = true;
    }
}

impl Default for ScrollGate {
    fn default() -> Self {
        Self::new(150.0)
    }
}
