use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use chatwatch_common::models::{ChatMessage, ChatWindowConfig, MessageKey};
use chatwatch_core::config;
use chatwatch_core::eventbus::InvalidationReason;
use chatwatch_core::platforms::ChatSource;
use chatwatch_core::platforms::twitch_irc::TwitchIrcSource;
use chatwatch_core::tasks::{spawn_chat_window, ChatWindowHandle};

mod console;

#[derive(Parser, Debug, Clone)]
#[command(name = "chatwatch")]
#[command(author, version, about = "chatwatch - tail a Twitch channel's chat with watch highlights")]
struct Args {
    /// Channel to follow (with or without the leading '#')
    channel: String,

    /// JSON file with chat window settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Max messages kept in each buffer
    #[arg(long)]
    capacity: Option<usize>,

    /// How long a highlight stays flagged, in milliseconds
    #[arg(long)]
    retention_ms: Option<u64>,

    /// Watch pattern to start with (repeatable)
    #[arg(long = "watch", short = 'w')]
    watch: Vec<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chatwatch=info"));
    let sub = fmt().with_env_filter(filter).with_writer(std::io::stderr).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {e}");
    }
}

fn load_config(args: &Args) -> anyhow::Result<ChatWindowConfig> {
    let base = match &args.config {
        Some(path) => config::load_from_file(path)?,
        None => ChatWindowConfig::default(),
    };
    let mut cfg = config::apply_env(base)?;
    if let Some(capacity) = args.capacity {
        cfg.capacity = capacity;
    }
    if let Some(retention) = args.retention_ms {
        cfg.highlight_retention_ms = retention;
    }
    Ok(config::validate(cfg)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = load_config(&args)?;
    info!("chatwatch starting. channel={}, capacity={}", args.channel, cfg.capacity);

    let mut window = spawn_chat_window(cfg);
    window.switch_channel(&args.channel)?;
    for pattern in &args.watch {
        if !window.add_pattern(pattern).await? {
            warn!("ignoring watch pattern {:?}", pattern);
        }
    }

    let mut source = TwitchIrcSource::new();
    source.connect().await?;
    source.join_channel(&args.channel).await?;
    window.attach_source(source);

    if let Err(e) = run_console(&window).await {
        error!("console error: {:?}", e);
    }

    window.dispose().await;
    info!("Main finished. Goodbye!");
    Ok(())
}

/// Prints new messages as they are rendered and handles stdin commands.
async fn run_console(window: &ChatWindowHandle) -> anyhow::Result<()> {
    let mut signals = window.subscribe().await?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut last_printed: Option<MessageKey> = None;

    loop {
        tokio::select! {
            signal = signals.recv() => {
                let Some(signal) = signal else { break };
                match signal.reason {
                    InvalidationReason::Appended | InvalidationReason::Flushed => {
                        let snapshot = window.snapshot().await?;
                        let highlighted: HashSet<MessageKey> = window
                            .watch_state()
                            .await?
                            .highlights
                            .into_iter()
                            .map(|h| h.key)
                            .collect();
                        last_printed = print_new(&snapshot, last_printed.as_ref(), &highlighted)
                            .or(last_printed);
                    }
                    InvalidationReason::Reset => {
                        last_printed = None;
                        println!("-- chat cleared --");
                    }
                    InvalidationReason::WatchChanged => {}
                }
            },
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                if !console::handle_line(window, &line).await? {
                    break;
                }
            },
        }
    }
    Ok(())
}

/// Prints everything after `last` in the snapshot (all of it if `last` was
/// trimmed away). Returns the key of the newest printed message.
fn print_new(
    snapshot: &[ChatMessage],
    last: Option<&MessageKey>,
    highlighted: &HashSet<MessageKey>,
) -> Option<MessageKey> {
    let start = last
        .and_then(|key| snapshot.iter().rposition(|m| m.key().as_ref() == Some(key)))
        .map(|idx| idx + 1)
        .unwrap_or(0);

    for msg in &snapshot[start..] {
        let marker = match msg.key() {
            Some(key) if highlighted.contains(&key) => "*",
            _ => " ",
        };
        let time = msg
            .received_at
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        println!("{marker} [{time}] {}: {}", msg.author.username, msg.text);
    }
    snapshot.last().and_then(ChatMessage::key)
}
