// File: chatwatch-core/tests/pipeline_tests.rs

use std::sync::Arc;

use chrono::{Duration, Utc};

use chatwatch_core::eventbus::InvalidationReason;
use chatwatch_core::models::{BufferKind, ChatMessage, ChatWindowConfig, Emote};
use chatwatch_core::services::IngestionPipeline;
use chatwatch_core::utils::time::{Clock, ManualClock};

fn build_pipeline(capacity: usize) -> (IngestionPipeline, ManualClock) {
    let clock = ManualClock::new(Utc::now());
    let config = ChatWindowConfig {
        capacity,
        highlight_retention_ms: 20_000,
        ..ChatWindowConfig::default()
    };
    let pipeline = IngestionPipeline::with_clock(config, Arc::new(clock.clone()));
    (pipeline, clock)
}

fn msg(user: &str, text: &str) -> ChatMessage {
    ChatMessage::new("somestreamer", user, text)
}

fn texts(msgs: &[ChatMessage]) -> Vec<String> {
    msgs.iter().map(|m| m.text.clone()).collect()
}

fn scroll_away(p: &mut IngestionPipeline) {
    p.report_scroll_position(0.0, 5000.0, 500.0);
}

fn scroll_to_bottom(p: &mut IngestionPipeline) {
    p.report_scroll_position(4500.0, 5000.0, 500.0);
}

#[test]
fn test_buffers_never_exceed_capacity() {
    let (mut p, clock) = build_pipeline(5);
    for i in 0..40 {
        if i % 7 == 0 {
            scroll_away(&mut p);
        }
        if i % 11 == 0 {
            scroll_to_bottom(&mut p);
        }
        p.on_message(msg("u", &format!("m{i}")));
        clock.advance(Duration::milliseconds(10));
        assert!(p.snapshot().len() <= 5);
        assert!(p.pending_snapshot().len() <= 5);
    }
}

#[test]
fn test_fifo_keeps_most_recent_in_arrival_order() {
    let (mut p, _clock) = build_pipeline(3);
    for i in 1..=7 {
        p.on_message(msg("u", &format!("m{i}")));
    }
    assert_eq!(texts(&p.snapshot()), vec!["m5", "m6", "m7"]);
}

#[test]
fn test_pin_transition_flushes_pending_in_order() {
    let (mut p, _clock) = build_pipeline(4);
    p.on_message(msg("u", "v1"));
    scroll_away(&mut p);
    for t in ["p1", "p2", "p3", "p4", "p5"] {
        assert_eq!(p.on_message(msg("u", t)), Some(BufferKind::Pending));
    }
    assert_eq!(texts(&p.pending_snapshot()), vec!["p2", "p3", "p4", "p5"]);
    assert_eq!(texts(&p.snapshot()), vec!["v1"]);

    scroll_to_bottom(&mut p);

    assert!(p.is_pinned());
    assert!(p.pending_snapshot().is_empty());
    assert_eq!(texts(&p.snapshot()), vec!["p2", "p3", "p4", "p5"]);
}

#[test]
fn test_only_visible_appends_signal() {
    let (mut p, _clock) = build_pipeline(10);
    let mut rx = p.subscribe();

    p.on_message(msg("u", "shown"));
    assert_eq!(rx.try_recv().unwrap().reason, InvalidationReason::Appended);

    scroll_away(&mut p);
    p.on_message(msg("u", "held"));
    assert!(rx.try_recv().is_err());
    assert_eq!(p.watch_state().pending_count, 1);
}

#[test]
fn test_add_pattern_twice_is_noop_second_time() {
    let (mut p, _clock) = build_pipeline(10);
    p.on_message(msg("a", "hello world"));

    assert!(p.add_pattern("hello"));
    let once = p.watch_state();
    assert!(!p.add_pattern("hello"));
    let twice = p.watch_state();

    assert_eq!(once, twice);
    assert_eq!(texts(&p.snapshot()), vec!["hello world"]);
}

#[test]
fn test_retroactive_match_flags_exactly_matching_message() {
    let (mut p, _clock) = build_pipeline(10);
    p.on_message(msg("a", "hello world"));
    p.on_message(msg("b", "foo"));

    p.add_pattern("hello");

    let state = p.watch_state();
    assert_eq!(state.highlights.len(), 1);
    let hit = &state.highlights[0];
    assert_eq!(hit.message.author.username, "a");
    assert_eq!(hit.message.text, "hello world");
    assert!(hit.patterns.contains("hello"));
}

#[test]
fn test_retroactive_match_includes_pending() {
    let (mut p, _clock) = build_pipeline(10);
    scroll_away(&mut p);
    p.on_message(msg("a", "queued hello"));
    p.add_pattern("HELLO");
    assert_eq!(p.watch_state().highlights.len(), 1);
}

#[test]
fn test_highlight_expires_after_retention() {
    let (mut p, clock) = build_pipeline(10);
    p.add_pattern("hello");
    let t0 = clock.now();
    p.on_message(msg("a", "hello there"));

    clock.set(t0 + Duration::milliseconds(19_999));
    p.expire_due();
    assert_eq!(p.watch_state().highlights.len(), 1);

    clock.set(t0 + Duration::milliseconds(20_001));
    p.expire_due();
    assert!(p.watch_state().highlights.is_empty());
}

#[test]
fn test_highlight_outlives_buffer_trim() {
    let (mut p, _clock) = build_pipeline(2);
    p.add_pattern("first");
    p.on_message(msg("a", "first!"));
    p.on_message(msg("b", "x"));
    p.on_message(msg("c", "y"));
    assert_eq!(texts(&p.snapshot()), vec!["x", "y"]);
    assert_eq!(p.watch_state().highlights.len(), 1);
}

#[test]
fn test_emote_overlap_is_clipped_on_ingest() {
    let (mut p, _clock) = build_pipeline(10);
    let mut m = msg("a", "KappaPride Keepo");
    m.emotes = vec![
        Emote {
            id: "2".into(),
            name: "Keepo".into(),
            image_ref: String::new(),
            start_index: 3,
            end_index: 8,
        },
        Emote {
            id: "1".into(),
            name: "Kappa".into(),
            image_ref: String::new(),
            start_index: 0,
            end_index: 5,
        },
    ];
    p.on_message(m);

    let stored = &p.snapshot()[0];
    let spans: Vec<(usize, usize)> = stored
        .emotes
        .iter()
        .map(|e| (e.start_index, e.end_index))
        .collect();
    assert_eq!(spans, vec![(0, 5), (6, 8)]);
    for pair in stored.emotes.windows(2) {
        assert!(pair[0].end_index < pair[1].start_index);
    }
}

#[test]
fn test_reset_clears_state_and_cancels_expiry() {
    let (mut p, clock) = build_pipeline(10);
    p.add_pattern("hello");
    p.on_message(msg("a", "hello"));
    scroll_away(&mut p);
    p.on_message(msg("b", "hello again"));
    assert_eq!(p.watch_state().highlights.len(), 2);

    p.reset();

    assert!(p.snapshot().is_empty());
    assert!(p.pending_snapshot().is_empty());
    assert!(p.watch_state().highlights.is_empty());
    assert_eq!(p.next_expiry(), None);

    let mut rx = p.subscribe();
    clock.advance(Duration::seconds(60));
    assert_eq!(p.expire_due(), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_switch_channel_keeps_patterns() {
    let (mut p, _clock) = build_pipeline(10);
    p.add_pattern("gg");
    p.on_message(msg("a", "gg"));
    p.switch_channel("#another");

    let state = p.watch_state();
    assert!(state.highlights.is_empty());
    assert_eq!(state.entries.len(), 1);
    assert_eq!(state.entries[0].match_count, 0);
    assert_eq!(p.channel(), Some("another"));
}
