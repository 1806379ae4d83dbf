//! stdin commands for the chat tail.

use tracing::info;

use chatwatch_core::tasks::ChatWindowHandle;

/// Handles one line of input. Returns `false` when the user asked to quit.
pub async fn handle_line(window: &ChatWindowHandle, line: &str) -> anyhow::Result<bool> {
    let line = line.trim();
    let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
    match cmd {
        "/watch" => {
            let active = window.toggle_pattern(arg).await?;
            println!("-- {} {:?} --", if active { "watching" } else { "not watching" }, arg.trim());
        }
        // pause/resume stand in for scrolling away from and back to the bottom
        "/pause" => window.report_scroll_position(0.0, f64::MAX, 0.0)?,
        "/resume" => window.report_scroll_position(0.0, 0.0, 0.0)?,
        "/state" => {
            let state = window.watch_state().await?;
            for entry in &state.entries {
                println!("-- {:>4}  {}", entry.match_count, entry.pattern);
            }
            println!(
                "-- {} highlight(s), {} pending --",
                state.highlights.len(),
                state.pending_count
            );
        }
        "/quit" => return Ok(false),
        "" => {}
        other => info!("unknown command {:?} (try /watch, /pause, /resume, /state, /quit)", other),
    }
    Ok(true)
}
