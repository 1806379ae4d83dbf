pub mod chat_window;

pub use chat_window::{spawn_chat_window, ChatWindowHandle, ChatWindowSender};
