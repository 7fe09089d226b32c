//! Twitch chat over IRC with TLS

use async_trait::async_trait;
use std::io;
use tokio::io::{split, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_native_tls::{native_tls, TlsConnector};
use tracing::{debug, info, warn};

use crate::collaborators::ChatTransport;
use crate::config::TwitchConfig;
use crate::error::{BotError, Result};

const IRC_HOST: &str = "irc.chat.twitch.tv";
const IRC_PORT: u16 = 6697;

/// Twitch rejects longer chat lines
pub const MAX_MESSAGE_CHARS: usize = 500;

/// One IRC line split into its parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrcLine {
    pub tags: Option<String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
    pub trailing: Option<String>,
}

impl IrcLine {
    pub fn parse(line: &str) -> Self {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        let mut parsed = Self::default();

        if let Some(tagged) = rest.strip_prefix('@') {
            let (tags, tail) = tagged.split_once(' ').unwrap_or((tagged, ""));
            parsed.tags = Some(tags.to_string());
            rest = tail;
        }

        if let Some(prefixed) = rest.strip_prefix(':') {
            let (prefix, tail) = prefixed.split_once(' ').unwrap_or((prefixed, ""));
            parsed.prefix = Some(prefix.to_string());
            rest = tail;
        }

        let (command, tail) = rest.split_once(' ').unwrap_or((rest, ""));
        parsed.command = command.to_ascii_uppercase();

        let middle = match tail.strip_prefix(':') {
            Some(trailing) => {
                parsed.trailing = Some(trailing.to_string());
                ""
            }
            None => match tail.split_once(" :") {
                Some((middle, trailing)) => {
                    parsed.trailing = Some(trailing.to_string());
                    middle
                }
                None => tail,
            },
        };
        parsed.params = middle.split_whitespace().map(str::to_string).collect();

        parsed
    }

    /// Value of an IRCv3 tag, `None` if the tag is absent
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.as_deref()?.split(';').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then_some(v)
        })
    }

    /// Login name from a `nick!user@host` prefix
    pub fn sender_login(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split_once('!').map_or(prefix, |(nick, _)| nick))
    }
}

/// A chat line posted in one of the joined channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitchChatMessage {
    pub channel: String,
    pub login: String,
    pub display_name: Option<String>,
    pub text: String,
}

impl TwitchChatMessage {
    /// `None` for anything that is not a channel PRIVMSG
    pub fn from_irc(line: &IrcLine) -> Option<Self> {
        if line.command != "PRIVMSG" {
            return None;
        }

        Some(Self {
            channel: line.params.first()?.clone(),
            login: line.sender_login()?.to_lowercase(),
            display_name: line
                .tag("display-name")
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            text: line.trailing.clone().unwrap_or_default(),
        })
    }
}

/// Build a PRIVMSG that fits on one chat line
pub fn privmsg_line(channel: &str, text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .take(MAX_MESSAGE_CHARS)
        .collect();
    format!("PRIVMSG {} :{}", channel, flat)
}

fn login_lines(config: &TwitchConfig) -> Vec<String> {
    vec![
        format!("PASS {}", config.oauth_token),
        format!("NICK {}", config.username),
        "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string(),
        format!("JOIN {}", config.channels.join(",")),
    ]
}

async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}

fn io_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

/// Owns the Twitch login and the queue of outgoing lines.
///
/// The queue outlives single connections, so replies produced while
/// reconnecting go out on the next connection.
pub struct TwitchIrc {
    config: TwitchConfig,
    outgoing: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl TwitchIrc {
    pub fn new(config: TwitchConfig) -> (Self, TwitchTransport) {
        let (tx, rx) = mpsc::unbounded_channel();
        let irc = Self {
            config,
            outgoing: Mutex::new(rx),
        };
        (irc, TwitchTransport { outgoing: tx })
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    /// Connect, log in and join, then pump lines until the server hangs up.
    ///
    /// Chat messages go to `incoming`. A rejected login is returned as
    /// `PermissionDenied`.
    pub async fn run_connection(
        &self,
        incoming: &mpsc::UnboundedSender<TwitchChatMessage>,
    ) -> io::Result<()> {
        let tcp = TcpStream::connect((IRC_HOST, IRC_PORT)).await?;
        let connector = TlsConnector::from(native_tls::TlsConnector::new().map_err(io_error)?);
        let tls = connector.connect(IRC_HOST, tcp).await.map_err(io_error)?;

        let (read_half, write_half) = split(tls);
        let mut writer = BufWriter::new(write_half);
        let mut lines = BufReader::new(read_half).lines();

        for line in login_lines(&self.config) {
            write_line(&mut writer, &line).await?;
        }
        info!(
            "Connected to Twitch chat as {}, joining {}",
            self.config.username,
            self.config.channels.join(", ")
        );

        let mut outgoing = self.outgoing.lock().await;
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        continue;
                    }

                    let parsed = IrcLine::parse(&line);
                    match parsed.command.as_str() {
                        "PING" => {
                            let token = parsed.trailing.as_deref().unwrap_or("tmi.twitch.tv");
                            write_line(&mut writer, &format!("PONG :{}", token)).await?;
                        }
                        "RECONNECT" => {
                            info!("Twitch asked for a reconnect");
                            return Ok(());
                        }
                        "NOTICE" if parsed
                            .trailing
                            .as_deref()
                            .is_some_and(|t| t.contains("authentication failed")) =>
                        {
                            return Err(io::Error::new(
                                io::ErrorKind::PermissionDenied,
                                "Twitch login authentication failed",
                            ));
                        }
                        _ => match TwitchChatMessage::from_irc(&parsed) {
                            Some(message) => {
                                if incoming.send(message).is_err() {
                                    warn!("Twitch chat receiver dropped, closing connection");
                                    return Ok(());
                                }
                            }
                            None => debug!("<< {}", line),
                        },
                    }
                }
                Some(out) = outgoing.recv() => {
                    write_line(&mut writer, &out).await?;
                }
            }
        }
    }
}

/// Sends replies into the shared outgoing queue
pub struct TwitchTransport {
    outgoing: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl ChatTransport for TwitchTransport {
    async fn send(&self, channel_id: &str, text: &str) -> Result<()> {
        self.outgoing
            .send(privmsg_line(channel_id, text))
            .map_err(|_| BotError::Transport {
                channel: channel_id.to_string(),
                message: "Twitch connection is shut down".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg_with_tags() {
        let line = IrcLine::parse(
            "@badge-info=;display-name=CoolUser;user-id=42 :cooluser!cooluser@cooluser.tmi.twitch.tv PRIVMSG #streamer :!ss http://example.com\r\n",
        );
        assert_eq!(line.command, "PRIVMSG");
        assert_eq!(line.params, vec!["#streamer".to_string()]);
        assert_eq!(line.trailing.as_deref(), Some("!ss http://example.com"));
        assert_eq!(line.tag("display-name"), Some("CoolUser"));
        assert_eq!(line.tag("badge-info"), Some(""));
        assert_eq!(line.tag("missing"), None);
        assert_eq!(line.sender_login(), Some("cooluser"));

        let message = TwitchChatMessage::from_irc(&line).unwrap();
        assert_eq!(message.channel, "#streamer");
        assert_eq!(message.login, "cooluser");
        assert_eq!(message.display_name.as_deref(), Some("CoolUser"));
        assert_eq!(message.text, "!ss http://example.com");
    }

    #[test]
    fn test_parse_ping_and_numeric() {
        let ping = IrcLine::parse("PING :tmi.twitch.tv");
        assert_eq!(ping.command, "PING");
        assert_eq!(ping.trailing.as_deref(), Some("tmi.twitch.tv"));
        assert!(TwitchChatMessage::from_irc(&ping).is_none());

        let welcome = IrcLine::parse(":tmi.twitch.tv 001 gatebot :Welcome, GLHF!");
        assert_eq!(welcome.command, "001");
        assert_eq!(welcome.params, vec!["gatebot".to_string()]);
        assert_eq!(welcome.sender_login(), Some("tmi.twitch.tv"));
    }

    #[test]
    fn test_privmsg_without_display_name_tag() {
        let line = IrcLine::parse(":viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #streamer :hello there");
        let message = TwitchChatMessage::from_irc(&line).unwrap();
        assert_eq!(message.display_name, None);
        assert_eq!(message.text, "hello there");
    }

    #[test]
    fn test_privmsg_line_is_single_and_bounded() {
        assert_eq!(privmsg_line("#streamer", "a\r\nb"), "PRIVMSG #streamer :a  b");

        let long = "x".repeat(MAX_MESSAGE_CHARS + 20);
        let line = privmsg_line("#s", &long);
        assert_eq!(line.len(), "PRIVMSG #s :".len() + MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_login_lines() {
        let config = TwitchConfig {
            username: "gatebot".to_string(),
            oauth_token: "oauth:abc".to_string(),
            channels: vec!["#one".to_string(), "#two".to_string()],
        };
        assert_eq!(
            login_lines(&config),
            vec![
                "PASS oauth:abc".to_string(),
                "NICK gatebot".to_string(),
                "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string(),
                "JOIN #one,#two".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_queues_privmsg() {
        let (irc, transport) = TwitchIrc::new(TwitchConfig {
            username: "gatebot".to_string(),
            oauth_token: "oauth:abc".to_string(),
            channels: vec!["#streamer".to_string()],
        });

        transport.send("#streamer", "@viewer, hi").await.unwrap();
        let queued = irc.outgoing.lock().await.recv().await;
        assert_eq!(queued.as_deref(), Some("PRIVMSG #streamer :@viewer, hi"));

        drop(irc);
        assert!(matches!(
            transport.send("#streamer", "late").await,
            Err(BotError::Transport { .. })
        ));
    }
}
