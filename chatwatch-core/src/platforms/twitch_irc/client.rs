//! src/platforms/twitch_irc/client.rs

use std::io;

use chrono::Utc;
use tokio::io::{split, AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_native_tls::native_tls;
use tokio_native_tls::TlsConnector;
use tracing::{debug, error, info};

use crate::models::{ChatAuthor, ChatMessage};
use super::tags::{parse_emotes_tag, parse_tags};

const TWITCH_IRC_HOST: &str = "irc.chat.twitch.tv";
const TWITCH_IRC_TLS_PORT: u16 = 6697;

/// Minimal representation of a parsed IRC message from Twitch.
#[derive(Debug, Clone)]
pub struct ParsedTwitchMsg {
    pub tags: Option<String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
    pub trailing: Option<String>,
}

impl ParsedTwitchMsg {
    pub fn parse_irc_line(line: &str) -> Self {
        let mut rest = line.trim();
        let mut tags = None;
        let mut prefix = None;
        let mut params = Vec::new();
        let mut trailing = None;

        if rest.starts_with('@') {
            match rest.split_once(' ') {
                Some((t, after)) => {
                    tags = Some(t.to_string());
                    rest = after;
                }
                None => {
                    return Self {
                        tags: Some(rest.to_string()),
                        prefix: None,
                        command: String::new(),
                        params,
                        trailing,
                    };
                }
            }
        }

        if rest.starts_with(':') {
            match rest.split_once(' ') {
                Some((p, after)) => {
                    prefix = Some(p.trim_start_matches(':').to_string());
                    rest = after;
                }
                None => {
                    return Self {
                        tags,
                        prefix: Some(rest.trim_start_matches(':').to_string()),
                        command: String::new(),
                        params,
                        trailing,
                    };
                }
            }
        }

        let (command, after) = rest.split_once(' ').unwrap_or((rest, ""));
        rest = after;

        let trailing_at = if rest.starts_with(':') {
            Some(0)
        } else {
            rest.find(" :").map(|i| i + 1)
        };
        if let Some(idx) = trailing_at {
            trailing = Some(rest[idx + 1..].to_string());
            params.extend(rest[..idx].split_whitespace().map(str::to_string));
        } else {
            params.extend(rest.split_whitespace().map(str::to_string));
        }

        Self {
            tags,
            prefix,
            command: command.to_string(),
            params,
            trailing,
        }
    }

    /// Turns a PRIVMSG into a [`ChatMessage`]; anything else yields `None`.
    pub fn to_chat_message(&self) -> Option<ChatMessage> {
        if !self.command.eq_ignore_ascii_case("PRIVMSG") {
            return None;
        }
        let channel = self.params.first()?.trim_start_matches('#').to_string();
        let raw_text = self.trailing.clone().unwrap_or_default();
        let text = strip_action(&raw_text).to_string();

        let tags = self.tags.as_deref().map(parse_tags).unwrap_or_default();
        // Login first; display-name may be localized.
        let username = self
            .prefix
            .as_deref()
            .and_then(|p| p.split_once('!').map(|(nick, _)| nick.to_string()))
            .or_else(|| tags.get("display-name").filter(|dn| !dn.is_empty()).cloned())
            .unwrap_or_default();
        let display_color = tags.get("color").filter(|c| !c.is_empty()).cloned();
        let emotes = tags
            .get("emotes")
            .map(|e| parse_emotes_tag(e, &text))
            .unwrap_or_default();

        Some(ChatMessage {
            channel,
            author: ChatAuthor { username, display_color },
            text,
            emotes,
            received_at: None,
        })
    }
}

/// `/me` messages arrive wrapped in CTCP ACTION.
fn strip_action(text: &str) -> &str {
    text.strip_prefix("\u{1}ACTION ")
        .map(|t| t.trim_end_matches('\u{1}'))
        .unwrap_or(text)
}

/// Read-only IRC client that connects to Twitch via TLS with an anonymous
/// `justinfan` login.
pub struct TwitchIrcClient {
    raw_outgoing: mpsc::UnboundedSender<String>,

    /// Stored as an `Option` so the owner can `take()` it.
    pub incoming: Option<mpsc::UnboundedReceiver<ChatMessage>>,

    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl TwitchIrcClient {
    pub async fn connect_anonymous() -> io::Result<Self> {
        let nick = format!("justinfan{}", 10_000 + Utc::now().timestamp_subsec_micros() % 80_000);
        Self::connect(&nick, "SCHMOOPIIE").await
    }

    /// Connects to `irc.chat.twitch.tv:6697` with TLS, does PASS/NICK/CAP,
    /// spawns read/write tasks.
    pub async fn connect(username: &str, password: &str) -> io::Result<Self> {
        let tcp = TcpStream::connect((TWITCH_IRC_HOST, TWITCH_IRC_TLS_PORT))
            .await
            .map_err(|e| io::Error::other(format!("TCP connect error: {e}")))?;

        let native_connector = native_tls::TlsConnector::new()
            .map_err(|e| io::Error::other(format!("TLSConnector::new() => {e}")))?;
        let connector = TlsConnector::from(native_connector);
        let tls_stream = connector
            .connect(TWITCH_IRC_HOST, tcp)
            .await
            .map_err(|e| io::Error::other(format!("TLS connect() => {e}")))?;

        let (read_half, write_half) = split(tls_stream);

        let (tx_outgoing, rx_outgoing) = mpsc::unbounded_channel::<String>();
        let (tx_incoming, rx_incoming) = mpsc::unbounded_channel::<ChatMessage>();

        let write_task = tokio::spawn(Self::writer_loop(write_half, rx_outgoing));

        tx_outgoing.send(format!("PASS {}", password)).ok();
        tx_outgoing.send(format!("NICK {}", username)).ok();
        tx_outgoing.send("CAP REQ :twitch.tv/tags twitch.tv/commands".to_string()).ok();

        let read_task = tokio::spawn(Self::reader_loop(read_half, tx_incoming, tx_outgoing.clone()));

        info!("(TwitchIrcClient) connected as {}", username);
        Ok(Self {
            raw_outgoing: tx_outgoing,
            incoming: Some(rx_incoming),
            read_task,
            write_task,
        })
    }

    async fn reader_loop<R>(
        read_half: R,
        tx_incoming: mpsc::UnboundedSender<ChatMessage>,
        tx_outgoing: mpsc::UnboundedSender<String>,
    ) where
        R: tokio::io::AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(read_half);
        let mut line_buffer = String::new();

        loop {
            line_buffer.clear();
            match reader.read_line(&mut line_buffer).await {
                Ok(0) => {
                    info!("(TwitchIrcClient) read_loop => EOF");
                    break;
                }
                Ok(_) => {
                    let line = line_buffer.trim_end();
                    if line.is_empty() {
                        continue;
                    }
                    debug!("<< {}", line);

                    let parsed = ParsedTwitchMsg::parse_irc_line(line);
                    if parsed.command.eq_ignore_ascii_case("PING") {
                        let trail = parsed.trailing.unwrap_or_default();
                        tx_outgoing.send(format!("PONG :{}", trail)).ok();
                        continue;
                    }

                    if let Some(msg) = parsed.to_chat_message() {
                        if tx_incoming.send(msg).is_err() {
                            debug!("(TwitchIrcClient) receiver dropped, stopping reader");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!("(TwitchIrcClient) read error => {:?}", e);
                    break;
                }
            }
        }

        info!("(TwitchIrcClient) reader_loop ended.");
    }

    async fn writer_loop<W>(mut write_half: W, mut rx_outgoing: mpsc::UnboundedReceiver<String>)
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        let mut writer = BufWriter::new(&mut write_half);

        while let Some(line) = rx_outgoing.recv().await {
            if line.starts_with("PASS ") {
                debug!(">> PASS ***");
            } else {
                debug!(">> {}", line);
            }
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                error!("writer error => {:?}", e);
                break;
            }
            if let Err(e) = writer.write_all(b"\r\n").await {
                error!("writer error => {:?}", e);
                break;
            }
            if let Err(e) = writer.flush().await {
                error!("writer flush error => {:?}", e);
                break;
            }
        }

        info!("(TwitchIrcClient) writer_loop ended.");
    }

    pub fn send_raw_line(&self, line: &str) {
        let _ = self.raw_outgoing.send(line.to_string());
    }

    pub fn join_channel(&self, channel: &str) {
        self.send_raw_line(&format!("JOIN #{}", channel.trim_start_matches('#')));
    }

    pub fn part_channel(&self, channel: &str) {
        self.send_raw_line(&format!("PART #{}", channel.trim_start_matches('#')));
    }

    /// Aborts the read/write tasks.
    pub fn shutdown(self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVMSG: &str = "@badge-info=;color=#FF4500;display-name=Viewer_One;emotes=25:0-4;user-id=99 \
        :viewer_one!viewer_one@viewer_one.tmi.twitch.tv PRIVMSG #somestreamer :Kappa nice play";

    #[test]
    fn parses_privmsg_line() {
        let parsed = ParsedTwitchMsg::parse_irc_line(PRIVMSG);
        assert_eq!(parsed.command, "PRIVMSG");
        assert_eq!(parsed.params, vec!["#somestreamer"]);
        assert_eq!(parsed.trailing.as_deref(), Some("Kappa nice play"));
        assert_eq!(parsed.prefix.as_deref(), Some("viewer_one!viewer_one@viewer_one.tmi.twitch.tv"));
    }

    #[test]
    fn privmsg_becomes_chat_message() {
        let msg = ParsedTwitchMsg::parse_irc_line(PRIVMSG)
            .to_chat_message()
            .expect("privmsg");
        assert_eq!(msg.channel, "somestreamer");
        assert_eq!(msg.author.username, "viewer_one");
        assert_eq!(msg.author.display_color.as_deref(), Some("#FF4500"));
        assert_eq!(msg.text, "Kappa nice play");
        assert_eq!(msg.emotes.len(), 1);
        assert_eq!(msg.emotes[0].name, "Kappa");
        assert!(msg.received_at.is_none());
    }

    #[test]
    fn action_wrapper_is_removed() {
        let line = ":someone!someone@someone.tmi.twitch.tv PRIVMSG #chan :\u{1}ACTION waves\u{1}";
        let msg = ParsedTwitchMsg::parse_irc_line(line).to_chat_message().unwrap();
        assert_eq!(msg.text, "waves");
        assert_eq!(msg.author.username, "someone");
    }

    #[test]
    fn localized_display_name_does_not_replace_login() {
        let line = "@display-name=\u{30e6}\u{30fc}\u{30b6}\u{30fc} :tanaka!tanaka@tanaka.tmi.twitch.tv PRIVMSG #chan :hi";
        let msg = ParsedTwitchMsg::parse_irc_line(line).to_chat_message().unwrap();
        assert_eq!(msg.author.username, "tanaka");
        assert_eq!(msg.watch_line(), "tanaka: hi");
    }

    #[test]
    fn non_privmsg_is_ignored() {
        let parsed = ParsedTwitchMsg::parse_irc_line("PING :tmi.twitch.tv");
        assert_eq!(parsed.command, "PING");
        assert_eq!(parsed.trailing.as_deref(), Some("tmi.twitch.tv"));
        assert!(parsed.to_chat_message().is_none());
    }
}
