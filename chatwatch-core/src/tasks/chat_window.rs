// src/tasks/chat_window.rs
//
// Runs one IngestionPipeline on its own task. Every input (messages, scroll
// samples, pattern edits, queries) comes in over a single command queue and
// is handled to completion before the next one, interleaved with the
// recount interval and the next highlight deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::Error;
use crate::config::MAX_INTERVAL_MS;
use crate::eventbus::RenderSignal;
use crate::models::{ChatMessage, ChatWindowConfig, WatchState};
use crate::platforms::ChatSource;
use crate::services::IngestionPipeline;
use crate::utils::time::{Clock, SystemClock};

#[derive(Debug)]
pub enum ChatWindowCommand {
    Message(ChatMessage),
    Scroll {
        scroll_top: f64,
        scroll_height: f64,
        client_height: f64,
    },
    AddPattern(String, oneshot::Sender<bool>),
    RemovePattern(String, oneshot::Sender<bool>),
    TogglePattern(String, oneshot::Sender<bool>),
    SwitchChannel(String),
    Reset,
    Snapshot(oneshot::Sender<Vec<ChatMessage>>),
    WatchState(oneshot::Sender<WatchState>),
    IsPinned(oneshot::Sender<bool>),
    Subscribe(oneshot::Sender<mpsc::UnboundedReceiver<RenderSignal>>),
    CurrentSignal(oneshot::Sender<Option<RenderSignal>>),
}

/// Cheap, cloneable way to feed a chat window.
#[derive(Debug, Clone)]
pub struct ChatWindowSender {
    commands: mpsc::UnboundedSender<ChatWindowCommand>,
}

impl ChatWindowSender {
    fn send(&self, cmd: ChatWindowCommand) -> Result<(), Error> {
        self.commands
            .send(cmd)
            .map_err(|_| Error::ChannelClosed("chat window task has stopped".into()))
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> ChatWindowCommand) -> Result<T, Error> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await
            .map_err(|_| Error::ChannelClosed("chat window dropped the request".into()))
    }

    pub fn push_message(&self, msg: ChatMessage) -> Result<(), Error> {
        self.send(ChatWindowCommand::Message(msg))
    }

    pub fn report_scroll_position(
        &self,
        scroll_top: f64,
        scroll_height: f64,
        client_height: f64,
    ) -> Result<(), Error> {
        self.send(ChatWindowCommand::Scroll {
            scroll_top,
            scroll_height,
            client_height,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Owner of a running chat window. Call [`ChatWindowHandle::dispose`] to
/// stop it; dropping the handle aborts the task.
pub struct ChatWindowHandle {
    sender: ChatWindowSender,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    pumps: Vec<JoinHandle<()>>,
}

impl ChatWindowHandle {
    pub fn sender(&self) -> ChatWindowSender {
        self.sender.clone()
    }

    pub fn push_message(&self, msg: ChatMessage) -> Result<(), Error> {
        self.sender.push_message(msg)
    }

    pub fn report_scroll_position(
        &self,
        scroll_top: f64,
        scroll_height: f64,
        client_height: f64,
    ) -> Result<(), Error> {
        self.sender
            .report_scroll_position(scroll_top, scroll_height, client_height)
    }

    pub async fn add_pattern(&self, pattern: &str) -> Result<bool, Error> {
        let pattern = pattern.to_string();
        self.sender
            .request(|tx| ChatWindowCommand::AddPattern(pattern, tx))
            .await
    }

    pub async fn remove_pattern(&self, pattern: &str) -> Result<bool, Error> {
        let pattern = pattern.to_string();
        self.sender
            .request(|tx| ChatWindowCommand::RemovePattern(pattern, tx))
            .await
    }

    pub async fn toggle_pattern(&self, pattern: &str) -> Result<bool, Error> {
        let pattern = pattern.to_string();
        self.sender
            .request(|tx| ChatWindowCommand::TogglePattern(pattern, tx))
            .await
    }

    pub fn switch_channel(&self, channel: &str) -> Result<(), Error> {
        self.sender
            .send(ChatWindowCommand::SwitchChannel(channel.to_string()))
    }

    pub fn reset(&self) -> Result<(), Error> {
        self.sender.send(ChatWindowCommand::Reset)
    }

    pub async fn snapshot(&self) -> Result<Vec<ChatMessage>, Error> {
        self.sender.request(ChatWindowCommand::Snapshot).await
    }

    pub async fn watch_state(&self) -> Result<WatchState, Error> {
        self.sender.request(ChatWindowCommand::WatchState).await
    }

    pub async fn is_pinned(&self) -> Result<bool, Error> {
        self.sender.request(ChatWindowCommand::IsPinned).await
    }

    pub async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<RenderSignal>, Error> {
        self.sender.request(ChatWindowCommand::Subscribe).await
    }

    pub async fn current_signal(&self) -> Result<Option<RenderSignal>, Error> {
        self.sender.request(ChatWindowCommand::CurrentSignal).await
    }

    /// Forwards every message from `source` into this window until the
    /// source ends or the window stops. The pump is cancelled by `dispose`.
    pub fn attach_source<S>(&mut self, source: S)
    where
        S: ChatSource + 'static,
    {
        let pump = spawn_source_pump(source, self.sender());
        self.pumps.push(pump);
    }

    /// Stops the window: cancels source pumps, the recount interval and
    /// every pending highlight expiry, then waits for the task to finish.
    pub async fn dispose(mut self) {
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("chat window task ended abnormally: {:?}", e);
            }
        }
    }
}

impl Drop for ChatWindowHandle {
    fn drop(&mut self) {
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawns a chat window on the wall clock.
pub fn spawn_chat_window(config: ChatWindowConfig) -> ChatWindowHandle {
    spawn_chat_window_with_clock(config, Arc::new(SystemClock))
}

pub fn spawn_chat_window_with_clock(config: ChatWindowConfig, clock: Arc<dyn Clock>) -> ChatWindowHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pipeline = IngestionPipeline::with_clock(config, clock.clone());

    let task = tokio::spawn(run_chat_window(pipeline, clock, cmd_rx, shutdown_rx));

    ChatWindowHandle {
        sender: ChatWindowSender { commands: cmd_tx },
        shutdown_tx,
        task: Some(task),
        pumps: Vec::new(),
    }
}

async fn run_chat_window(
    mut pipeline: IngestionPipeline,
    clock: Arc<dyn Clock>,
    mut cmd_rx: mpsc::UnboundedReceiver<ChatWindowCommand>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let recount_every = Duration::from_millis(pipeline.config().recount_interval_ms.clamp(1, MAX_INTERVAL_MS));
    let mut recount = tokio::time::interval_at(tokio::time::Instant::now() + recount_every, recount_every);
    recount.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "chat window started: capacity={} retention={}ms recount={}ms",
        pipeline.config().capacity,
        pipeline.config().highlight_retention_ms,
        recount_every.as_millis()
    );

    loop {
        // Commands win the biased select, so a backlog would otherwise
        // starve the expiry branch.
        pipeline.expire_due();

        let until_expiry = pipeline
            .next_expiry()
            .map(|at| (at - clock.now()).to_std().unwrap_or(Duration::ZERO));

        tokio::select! {
            biased;
            Ok(_) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("chat window shutting down");
                    break;
                }
            },
            maybe_cmd = cmd_rx.recv() => {
                match maybe_cmd {
                    Some(cmd) => handle_command(&mut pipeline, cmd),
                    None => {
                        info!("chat window command channel closed");
                        break;
                    }
                }
            },
            _ = sleep_for(until_expiry) => {
                pipeline.expire_due();
            },
            _ = recount.tick() => {
                let counts = pipeline.recount();
                debug!("recounted {} watch pattern(s)", counts.len());
            },
        }
    }

    pipeline.dispose();
    info!("chat window task exited");
}

fn handle_command(pipeline: &mut IngestionPipeline, cmd: ChatWindowCommand) {
    match cmd {
        ChatWindowCommand::Message(msg) => {
            pipeline.on_message(msg);
        }
        ChatWindowCommand::Scroll {
            scroll_top,
            scroll_height,
            client_height,
        } => {
            pipeline.report_scroll_position(scroll_top, scroll_height, client_height);
        }
        ChatWindowCommand::AddPattern(p, reply) => {
            let _ = reply.send(pipeline.add_pattern(&p));
        }
        ChatWindowCommand::RemovePattern(p, reply) => {
            let _ = reply.send(pipeline.remove_pattern(&p));
        }
        ChatWindowCommand::TogglePattern(p, reply) => {
            let _ = reply.send(pipeline.toggle_pattern(&p));
        }
        ChatWindowCommand::SwitchChannel(channel) => pipeline.switch_channel(&channel),
        ChatWindowCommand::Reset => pipeline.reset(),
        ChatWindowCommand::Snapshot(reply) => {
            let _ = reply.send(pipeline.snapshot());
        }
        ChatWindowCommand::WatchState(reply) => {
            let _ = reply.send(pipeline.watch_state());
        }
        ChatWindowCommand::IsPinned(reply) => {
            let _ = reply.send(pipeline.is_pinned());
        }
        ChatWindowCommand::Subscribe(reply) => {
            let _ = reply.send(pipeline.subscribe());
        }
        ChatWindowCommand::CurrentSignal(reply) => {
            let _ = reply.send(pipeline.current_signal());
        }
    }
}

async fn sleep_for(duration: Option<Duration>) {
    match duration {
        Some(d) => sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}

/// Pulls from a [`ChatSource`] and forwards into a chat window.
pub fn spawn_source_pump<S>(mut source: S, sender: ChatWindowSender) -> JoinHandle<()>
where
    S: ChatSource + 'static,
{
    tokio::spawn(async move {
        while let Some(msg) = source.next_message().await {
            if sender.push_message(msg).is_err() {
                debug!("chat window gone, stopping source pump");
                break;
            }
        }
        if let Err(e) = source.disconnect().await {
            warn!("source disconnect failed: {:?}", e);
        }
        info!("source pump ended");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::MockChatSource;
    use crate::utils::time::{millis, ManualClock};
    use chrono::{TimeZone, Utc};
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_source_pump_forwards_until_stream_ends() {
        let mut source = MockChatSource::new();
        let mut remaining = vec![
            ChatMessage::new("chan", "b", "second"),
            ChatMessage::new("chan", "a", "first"),
        ];
        source
            .expect_next_message()
            .returning(move || remaining.pop());
        source.expect_disconnect().returning(|| Ok(()));

        let mut handle = spawn_chat_window(ChatWindowConfig::default());
        let mut rx = handle.subscribe().await.unwrap();
        handle.attach_source(source);

        for _ in 0..2 {
            timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("signal in time")
                .expect("stream open");
        }
        let texts: Vec<String> = handle
            .snapshot()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
        handle.dispose().await;
    }

    #[tokio::test]
    async fn test_overdue_highlight_is_gone_behind_a_backlog() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let config = ChatWindowConfig::default();
        let retention = config.highlight_retention_ms;
        let handle = spawn_chat_window_with_clock(config, Arc::new(clock.clone()));

        assert!(handle.add_pattern("hello").await.unwrap());
        handle.push_message(ChatMessage::new("chan", "a", "hello world")).unwrap();
        assert_eq!(handle.watch_state().await.unwrap().highlights.len(), 1);

        clock.advance(millis(retention + 1));
        for i in 0..2_000 {
            handle
                .push_message(ChatMessage::new("chan", "b", &format!("filler {i}")))
                .unwrap();
        }

        let state = handle.watch_state().await.unwrap();
        assert!(state.highlights.is_empty());
        handle.dispose().await;
    }
}
