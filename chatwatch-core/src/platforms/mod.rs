// File: src/platforms/mod.rs

use async_trait::async_trait;

use crate::Error;
use crate::models::ChatMessage;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error(String),
}

/// A push stream of chat messages. The chat window never owns the
/// transport; it only pulls finished [`ChatMessage`] values out of it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatSource: Send {
    async fn connect(&mut self) -> Result<(), Error>;
    async fn join_channel(&mut self, channel: &str) -> Result<(), Error>;
    async fn leave_channel(&mut self, channel: &str) -> Result<(), Error>;
    /// Next inbound message, or `None` once the stream has ended.
    async fn next_message(&mut self) -> Option<ChatMessage>;
    async fn disconnect(&mut self) -> Result<(), Error>;
    fn connection_status(&self) -> ConnectionStatus;
}

pub mod twitch_irc;
