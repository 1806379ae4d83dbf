// File: chatwatch-common/src/models/mod.rs
pub mod chat;
pub mod window;
pub mod watch;

pub use chat::{ChatAuthor, ChatMessage, Emote, MessageKey};
pub use window::{BufferKind, ChatWindowConfig};
pub use watch::{HighlightedMatch, WatchEntry, WatchState};
