// File: src/services/watch_list.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

use crate::models::{ChatMessage, HighlightedMatch, MessageKey, WatchEntry};

/// Position of a highlight in the expiry schedule. The sequence number keeps
/// entries with the same deadline distinct and in creation order.
type TimerId = (DateTime<Utc>, u64);

#[derive(Debug, Clone)]
struct Tracked {
    entry: HighlightedMatch,
    timer: TimerId,
}

/// Watch patterns, their match counts, and the messages currently flagged
/// by them.
///
/// Each highlight carries its own deadline in an ordered schedule; nothing
/// here runs timers itself. Whoever drives the event loop calls
/// [`WatchListIndex::expire_due`] when [`WatchListIndex::next_expiry`] comes
/// around. Cancelling an entry removes it from the schedule, so a cleared
/// highlight can never fire later.
#[derive(Debug, Clone)]
pub struct WatchListIndex {
    patterns: BTreeMap<String, usize>,
    highlights: HashMap<MessageKey, Tracked>,
    schedule: BTreeMap<TimerId, MessageKey>,
    next_seq: u64,
    retention: Duration,
    min_pattern_len: usize,
}

impl WatchListIndex {
    pub fn new(retention: Duration, min_pattern_len: usize) -> Self {
        Self {
            patterns: BTreeMap::new(),
            highlights: HashMap::new(),
            schedule: BTreeMap::new(),
            next_seq: 0,
            retention,
            min_pattern_len: min_pattern_len.max(1),
        }
    }

    /// Trims and lowercases a user-supplied pattern; `None` if it is too short.
    pub fn normalize_pattern(&self, raw: &str) -> Option<String> {
        let pattern = raw.trim().to_lowercase();
        if pattern.chars().count() < self.min_pattern_len {
            None
        } else {
            Some(pattern)
        }
    }

    pub fn contains_pattern(&self, raw: &str) -> bool {
        self.normalize_pattern(raw)
            .is_some_and(|p| self.patterns.contains_key(&p))
    }

    /// Adds a pattern if it is valid and not already present.
    ///
    /// Does not toggle: adding an existing pattern is a no-op returning `false`.
    pub fn add_pattern(&mut self, raw: &str) -> bool {
        let Some(pattern) = self.normalize_pattern(raw) else {
            debug!("rejecting watch pattern {:?}: too short", raw);
            return false;
        };
        if self.patterns.contains_key(&pattern) {
            return false;
        }
        debug!("watching {:?}", pattern);
        self.patterns.insert(pattern, 0);
        true
    }

    /// Stops watching a pattern. Highlights it already produced expire on
    /// their own schedule.
    pub fn remove_pattern(&mut self, raw: &str) -> bool {
        let Some(pattern) = self.normalize_pattern(raw) else {
            return false;
        };
        let removed = self.patterns.remove(&pattern).is_some();
        if removed {
            debug!("no longer watching {:?}", pattern);
        }
        removed
    }

    /// Matches one new message against every pattern, flagging it on a hit.
    pub fn evaluate(&mut self, msg: &ChatMessage, now: DateTime<Utc>) -> BTreeSet<String> {
        if self.patterns.is_empty() {
            return BTreeSet::new();
        }
        let line = msg.watch_line();
        let matched: BTreeSet<String> = self
            .patterns
            .keys()
            .filter(|p| line.contains(p.as_str()))
            .cloned()
            .collect();
        if !matched.is_empty() {
            self.attach(msg, matched.clone(), now);
        }
        matched
    }

    /// Scans already-buffered messages once for a pattern that was just added.
    pub fn retro_match<'a, I>(&mut self, raw: &str, messages: I, now: DateTime<Utc>) -> usize
    where
        I: IntoIterator<Item = &'a ChatMessage>,
    {
        let Some(pattern) = self.normalize_pattern(raw) else {
            return 0;
        };
        if !self.patterns.contains_key(&pattern) {
            return 0;
        }
        let mut hits = 0;
        for msg in messages {
            if msg.watch_line().contains(pattern.as_str()) {
                self.attach(msg, BTreeSet::from([pattern.clone()]), now);
                hits += 1;
            }
        }
        trace!("retroactive scan for {:?} flagged {} message(s)", pattern, hits);
        hits
    }

    /// Recomputes every pattern's match count over the active window.
    pub fn recount<'a, I>(&mut self, messages: I) -> BTreeMap<String, usize>
    where
        I: IntoIterator<Item = &'a ChatMessage>,
    {
        let lines: Vec<String> = messages.into_iter().map(ChatMessage::watch_line).collect();
        for (pattern, count) in self.patterns.iter_mut() {
            *count = lines.iter().filter(|l| l.contains(pattern.as_str())).count();
        }
        self.patterns.clone()
    }

    /// Drops every highlight whose deadline is at or before `now`.
    pub fn expire_due(&mut self, now: DateTime<Utc>) -> usize {
        let mut expired = 0;
        while let Some((&timer, _)) = self.schedule.first_key_value() {
            if timer.0 > now {
                break;
            }
            if let Some(key) = self.schedule.remove(&timer) {
                self.highlights.remove(&key);
                expired += 1;
            }
        }
        if expired > 0 {
            trace!("expired {} highlight(s)", expired);
        }
        expired
    }

    pub fn next_expiry(&self) -> Option<DateTime<Utc>> {
        self.schedule.first_key_value().map(|(timer, _)| timer.0)
    }

    /// Removes one highlight and its pending expiry. Unknown keys are a no-op.
    pub fn cancel(&mut self, key: &MessageKey) -> bool {
        match self.highlights.remove(key) {
            Some(tracked) => {
                self.schedule.remove(&tracked.timer);
                true
            }
            None => false,
        }
    }

    /// Cancels every highlight. Returns how many were dropped.
    pub fn clear_highlights(&mut self) -> usize {
        let dropped = self.highlights.len();
        self.highlights.clear();
        self.schedule.clear();
        dropped
    }

    /// Clears highlights and zeroes counts; patterns are kept.
    pub fn reset(&mut self) {
        self.clear_highlights();
        for count in self.patterns.values_mut() {
            *count = 0;
        }
    }

    pub fn is_highlighted(&self, key: &MessageKey) -> bool {
        self.highlights.contains_key(key)
    }

    pub fn highlight(&self, key: &MessageKey) -> Option<&HighlightedMatch> {
        self.highlights.get(key).map(|t| &t.entry)
    }

    /// Active highlights, oldest first.
    pub fn highlights(&self) -> Vec<HighlightedMatch> {
        self.schedule
            .values()
            .filter_map(|key| self.highlights.get(key))
            .map(|t| t.entry.clone())
            .collect()
    }

    pub fn highlight_count(&self) -> usize {
        self.highlights.len()
    }

    pub fn entries(&self) -> Vec<WatchEntry> {
        self.patterns
            .iter()
            .map(|(pattern, count)| WatchEntry {
                pattern: pattern.clone(),
                match_count: *count,
            })
            .collect()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    fn attach(&mut self, msg: &ChatMessage, patterns: BTreeSet<String>, now: DateTime<Utc>) {
        let Some(key) = msg.key() else {
            return;
        };
        if let Some(existing) = self.highlights.get_mut(&key) {
            existing.entry.patterns.extend(patterns);
            return;
        }

        let expires_at = now
            .checked_add_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let timer = (expires_at, self.next_seq);
        self.next_seq += 1;

        self.schedule.insert(timer, key.clone());
        self.highlights.insert(
            key.clone(),
            Tracked {
                entry: HighlightedMatch {
                    key,
                    message: msg.clone(),
                    patterns,
                    created_at: now,
                    expires_at,
                },
                timer,
            },
        );
    }
}
