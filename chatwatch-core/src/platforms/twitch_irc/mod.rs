//! src/platforms/twitch_irc/mod.rs

pub mod client;
pub mod tags;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::Error;
use crate::models::ChatMessage;
use crate::platforms::{ChatSource, ConnectionStatus};

use client::TwitchIrcClient;

/// [`ChatSource`] backed by an anonymous Twitch IRC connection.
pub struct TwitchIrcSource {
    connection_status: ConnectionStatus,
    client: Option<TwitchIrcClient>,
    incoming: Option<mpsc::UnboundedReceiver<ChatMessage>>,
}

impl TwitchIrcSource {
    pub fn new() -> Self {
        Self {
            connection_status: ConnectionStatus::Disconnected,
            client: None,
            incoming: None,
        }
    }

    fn client(&self) -> Result<&TwitchIrcClient, Error> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::Platform("No active Twitch IRC connection".into()))
    }
}

impl Default for TwitchIrcSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatSource for TwitchIrcSource {
    async fn connect(&mut self) -> Result<(), Error> {
        if self.client.is_some() {
            info!("(TwitchIrcSource) connect => already connected");
            return Ok(());
        }

        let mut client = match TwitchIrcClient::connect_anonymous().await {
            Ok(c) => c,
            Err(e) => {
                let msg = format!("Error connecting to Twitch IRC => {}", e);
                error!("{}", msg);
                self.connection_status = ConnectionStatus::Error(msg);
                return Err(Error::Platform("Twitch IRC connect failed".into()));
            }
        };
        self.incoming = client.incoming.take();
        if self.incoming.is_none() {
            return Err(Error::Platform("No incoming channel in TwitchIrcClient".into()));
        }
        self.client = Some(client);
        self.connection_status = ConnectionStatus::Connected;
        Ok(())
    }

    async fn join_channel(&mut self, channel: &str) -> Result<(), Error> {
        self.client()?.join_channel(channel);
        Ok(())
    }

    async fn leave_channel(&mut self, channel: &str) -> Result<(), Error> {
        self.client()?.part_channel(channel);
        Ok(())
    }

    async fn next_message(&mut self) -> Option<ChatMessage> {
        let msg = match self.incoming.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        };
        if msg.is_none() && self.connection_status == ConnectionStatus::Connected {
            info!("(TwitchIrcSource) stream ended");
            self.connection_status = ConnectionStatus::Disconnected;
        }
        msg
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        self.connection_status = ConnectionStatus::Disconnected;
        self.incoming = None;
        if let Some(cli) = self.client.take() {
            cli.shutdown();
        }
        Ok(())
    }

    fn connection_status(&self) -> ConnectionStatus {
        self.connection_status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_fail_without_connection() {
        let mut source = TwitchIrcSource::new();
        assert!(matches!(source.join_channel("chan").await, Err(Error::Platform(_))));
        assert!(source.next_message().await.is_none());
        assert_eq!(source.connection_status(), ConnectionStatus::Disconnected);
        assert!(source.disconnect().await.is_ok());
    }
}
