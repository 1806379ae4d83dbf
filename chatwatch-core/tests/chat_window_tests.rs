// File: chatwatch-core/tests/chat_window_tests.rs

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_test::assert_ok;

use chatwatch_core::Error;
use chatwatch_core::eventbus::InvalidationReason;
use chatwatch_core::models::{ChatMessage, ChatWindowConfig};
use chatwatch_core::tasks::spawn_chat_window;

fn fast_config() -> ChatWindowConfig {
    ChatWindowConfig {
        capacity: 50,
        highlight_retention_ms: 80,
        recount_interval_ms: 20,
        ..ChatWindowConfig::default()
    }
}

#[tokio::test]
async fn test_messages_reach_snapshot_and_signal() -> Result<(), Error> {
    let handle = spawn_chat_window(fast_config());
    let mut rx = handle.subscribe().await?;

    handle.push_message(ChatMessage::new("chan", "a", "hello"))?;

    let signal = timeout(Duration::from_secs(1), rx.recv()).await?;
    assert_eq!(signal.map(|s| s.reason), Some(InvalidationReason::Appended));
    assert_eq!(handle.snapshot().await?.len(), 1);
    assert_eq!(handle.current_signal().await?.map(|s| s.reason), Some(InvalidationReason::Appended));

    handle.dispose().await;
    Ok(())
}

#[tokio::test]
async fn test_highlight_expires_on_its_own() -> Result<(), Error> {
    let handle = spawn_chat_window(fast_config());
    assert!(handle.add_pattern("hello").await?);
    handle.push_message(ChatMessage::new("chan", "a", "hello there"))?;

    assert_eq!(handle.watch_state().await?.highlights.len(), 1);
    sleep(Duration::from_millis(250)).await;
    assert!(handle.watch_state().await?.highlights.is_empty());

    handle.dispose().await;
    Ok(())
}

#[tokio::test]
async fn test_periodic_recount_updates_counts() -> Result<(), Error> {
    let handle = spawn_chat_window(fast_config());
    handle.add_pattern("pog").await?;
    handle.push_message(ChatMessage::new("chan", "a", "POG"))?;
    handle.push_message(ChatMessage::new("chan", "b", "pogchamp"))?;

    sleep(Duration::from_millis(100)).await;
    let state = handle.watch_state().await?;
    assert_eq!(state.entries[0].pattern, "pog");
    assert_eq!(state.entries[0].match_count, 2);

    handle.dispose().await;
    Ok(())
}

#[tokio::test]
async fn test_scroll_gate_holds_then_flushes() -> Result<(), Error> {
    let handle = spawn_chat_window(fast_config());
    handle.report_scroll_position(0.0, 3000.0, 600.0)?;
    handle.push_message(ChatMessage::new("chan", "a", "while away"))?;

    assert!(!handle.is_pinned().await?);
    assert!(handle.snapshot().await?.is_empty());
    assert_eq!(handle.watch_state().await?.pending_count, 1);

    handle.report_scroll_position(2400.0, 3000.0, 600.0)?;
    assert!(handle.is_pinned().await?);
    assert_eq!(handle.snapshot().await?.len(), 1);

    handle.dispose().await;
    Ok(())
}

#[tokio::test]
async fn test_switch_channel_cancels_pending_expiry() -> Result<(), Error> {
    let handle = spawn_chat_window(fast_config());
    handle.add_pattern("hello").await?;
    handle.push_message(ChatMessage::new("chan", "a", "hello"))?;
    handle.switch_channel("other")?;

    let mut rx = handle.subscribe().await?;
    assert!(handle.watch_state().await?.highlights.is_empty());

    sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err(), "no expiry or recount signal after reset");

    handle.dispose().await;
    Ok(())
}

#[tokio::test]
async fn test_dispose_closes_everything() {
    let handle = spawn_chat_window(fast_config());
    let sender = handle.sender();
    let mut rx = assert_ok!(handle.subscribe().await);

    handle.dispose().await;

    assert!(matches!(
        sender.push_message(ChatMessage::new("chan", "a", "late")),
        Err(Error::ChannelClosed(_))
    ));
    assert!(sender.is_closed());
    assert!(rx.recv().await.is_none());
}
