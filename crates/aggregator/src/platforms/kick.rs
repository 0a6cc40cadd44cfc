//! Kick chat source.
//!
//! Two transports behind one connector contract, selected by configuration:
//! a persistent IRC-over-WebSocket stream (default) where `fetch_next`
//! blocks on the next inbound frame, and a REST polling fallback whose
//! messages carry native IDs and go through the shared dedup window.

use crate::connector::{ChatSource, FetchPage, SessionHandle};
use crate::error::{ConnectorError, Result};
use crate::event::{ChatEvent, Platform};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const KICK_WS_URL: &str = "wss://irc-ws.chat.kick.com/";
const KICK_API_BASE: &str = "https://kick.com/api/v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KickTransport {
    #[default]
    WebSocket,
    Polling,
}

impl FromStr for KickTransport {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(KickTransport::WebSocket),
            "polling" | "poll" | "rest" => Ok(KickTransport::Polling),
            other => Err(format!("unknown kick transport: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KickConfig {
    pub channel: String,
    /// IRC nick; a random anonymous nick is generated when absent.
    pub username: Option<String>,
    pub transport: KickTransport,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct KickSource {
    client: Client,
    config: KickConfig,
    ws: Option<WsStream>,
}

impl KickSource {
    pub fn new(client: Client, config: KickConfig) -> Self {
        Self {
            client,
            config,
            ws: None,
        }
    }

    fn nick(&self) -> String {
        self.config
            .username
            .clone()
            .unwrap_or_else(|| format!("relay{}", rand::random::<u32>() % 100_000))
    }

    fn handshake_messages(&self) -> Vec<Message> {
        vec![
            Message::Text(format!("NICK {}", self.nick()).into()),
            Message::Text(format!("JOIN #{}", self.config.channel).into()),
        ]
    }

    async fn connect_websocket(&mut self) -> Result<()> {
        self.ws = None;
        let (mut ws, _) = connect_async(KICK_WS_URL).await?;
        for message in self.handshake_messages() {
            ws.send(message).await?;
        }
        self.ws = Some(ws);
        Ok(())
    }

    /// Block until at least one PRIVMSG line arrives; answer PING in place.
    async fn next_frame_lines(&mut self) -> Result<Vec<KickRaw>> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| ConnectorError::Other("websocket not connected".into()))?;

        loop {
            let frame = match ws.next().await {
                Some(frame) => frame?,
                None => return Err(ConnectorError::Other("websocket stream ended".into())),
            };

            match frame {
                Message::Text(text) => {
                    let mut items = Vec::new();
                    for line in text.lines() {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        if let Some(payload) = trimmed.strip_prefix("PING") {
                            ws.send(Message::Text(format!("PONG{payload}").into()))
                                .await?;
                            continue;
                        }
                        if trimmed.contains("PRIVMSG") {
                            items.push(KickRaw::Frame(trimmed.to_string()));
                        }
                    }
                    if !items.is_empty() {
                        return Ok(items);
                    }
                }
                Message::Ping(payload) => {
                    ws.send(Message::Pong(payload)).await?;
                }
                Message::Close(_) => {
                    return Err(ConnectorError::Other("websocket closed by server".into()));
                }
                _ => {}
            }
        }
    }

    async fn poll_messages(&self) -> Result<Vec<KickRaw>> {
        let url = format!("{KICK_API_BASE}/channels/{}/messages", self.config.channel);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::from_status(status, "kick messages"));
        }
        let body: MessagesResponse = response.json().await?;
        Ok(body
            .data
            .messages
            .into_iter()
            .map(KickRaw::Rest)
            .collect())
    }
}

#[async_trait]
impl ChatSource for KickSource {
    type Raw = KickRaw;

    fn platform(&self) -> Platform {
        Platform::Kick
    }

    async fn discover(&mut self) -> Result<SessionHandle> {
        // The channel handle is the session; for the websocket transport,
        // establishing the connection is the discovery step.
        if self.config.transport == KickTransport::WebSocket {
            self.connect_websocket().await?;
        }
        let channel = self.config.channel.clone();
        Ok(SessionHandle::new(channel.clone(), format!("#{channel}")))
    }

    async fn fetch_next(
        &mut self,
        _session: &SessionHandle,
        _cursor: Option<&str>,
    ) -> Result<FetchPage<KickRaw>> {
        match self.config.transport {
            KickTransport::WebSocket => {
                let items = self.next_frame_lines().await?;
                // Streaming transport: no pacing between frames.
                Ok(FetchPage::new(items).with_poll_after(Duration::ZERO))
            }
            KickTransport::Polling => Ok(FetchPage::new(self.poll_messages().await?)),
        }
    }

    fn message_id(&self, raw: &KickRaw) -> Option<String> {
        match raw {
            // IRC frames carry no native ID; the stream has no overlap to
            // suppress.
            KickRaw::Frame(_) => None,
            KickRaw::Rest(message) => Some(message.id.clone()),
        }
    }

    fn parse(&self, raw: KickRaw) -> Result<ChatEvent> {
        match raw {
            KickRaw::Frame(line) => {
                let (author, text) = parse_irc_line(&line)
                    .ok_or_else(|| ConnectorError::Parse(format!("unparseable irc line: {line}")))?;
                Ok(ChatEvent::new(Platform::Kick, author, text))
            }
            KickRaw::Rest(message) => {
                let author = message
                    .sender
                    .ok_or_else(|| ConnectorError::Parse("message missing sender".into()))?
                    .username;
                let text = message
                    .content
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| ConnectorError::Parse("message missing content".into()))?;
                Ok(ChatEvent::new(Platform::Kick, author, text))
            }
        }
    }
}

#[derive(Debug)]
pub enum KickRaw {
    /// One IRC line from the websocket transport.
    Frame(String),
    /// One message from the REST fallback.
    Rest(RestMessage),
}

/// Parse `:<author>!… PRIVMSG #<channel> :<text>`.
fn parse_irc_line(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix(':')?;
    let (prefix, rest) = rest.split_once(" PRIVMSG ")?;
    let author = prefix.split('!').next()?.trim();
    let (_target, text) = rest.split_once(" :")?;
    if author.is_empty() {
        return None;
    }
    Some((author.to_string(), text.trim().to_string()))
}

#[derive(Debug, Default, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    data: MessagesData,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesData {
    #[serde(default)]
    messages: Vec<RestMessage>,
}

#[derive(Debug, Deserialize)]
pub struct RestMessage {
    id: String,
    sender: Option<RestSender>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestSender {
    username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(transport: KickTransport) -> KickSource {
        KickSource::new(
            Client::new(),
            KickConfig {
                channel: "streamer".into(),
                username: Some("relaybot".into()),
                transport,
            },
        )
    }

    #[test]
    fn test_parse_irc_privmsg() {
        let line = ":ann!ann@kick PRIVMSG #streamer :hello world";
        assert_eq!(
            parse_irc_line(line),
            Some(("ann".to_string(), "hello world".to_string()))
        );
    }

    #[test]
    fn test_parse_irc_text_with_colons() {
        let line = ":bob!bob@kick PRIVMSG #streamer :scores: 3 : 1";
        assert_eq!(
            parse_irc_line(line),
            Some(("bob".to_string(), "scores: 3 : 1".to_string()))
        );
    }

    #[test]
    fn test_parse_irc_rejects_non_privmsg() {
        assert!(parse_irc_line("PING :tmi.kick.com").is_none());
        assert!(parse_irc_line(":server 001 relaybot :Welcome").is_none());
        assert!(parse_irc_line("garbage").is_none());
    }

    #[test]
    fn test_parse_frame_event() {
        let src = source(KickTransport::WebSocket);
        let raw = KickRaw::Frame(":ann!ann@kick PRIVMSG #streamer :hi".into());
        assert!(src.message_id(&raw).is_none());
        let event = src.parse(raw).unwrap();
        assert_eq!(event.platform, Platform::Kick);
        assert_eq!(event.author, "ann");
        assert_eq!(event.text, "hi");
    }

    #[test]
    fn test_parse_malformed_frame_is_parse_error() {
        let src = source(KickTransport::WebSocket);
        let raw = KickRaw::Frame("not an irc line PRIVMSG".into());
        assert!(src.parse(raw).is_err());
    }

    #[test]
    fn test_rest_message_roundtrip() {
        let src = source(KickTransport::Polling);
        let response: MessagesResponse = serde_json::from_str(
            r#"{"data": {"messages": [
                {"id": "m1", "sender": {"username": "ann"}, "content": "hello"}
            ]}}"#,
        )
        .unwrap();
        let raw = KickRaw::Rest(response.data.messages.into_iter().next().unwrap());
        assert_eq!(src.message_id(&raw).as_deref(), Some("m1"));
        let event = src.parse(raw).unwrap();
        assert_eq!(event.author, "ann");
        assert_eq!(event.text, "hello");
    }

    #[test]
    fn test_transport_from_str() {
        assert_eq!(
            "websocket".parse::<KickTransport>().unwrap(),
            KickTransport::WebSocket
        );
        assert_eq!(
            "POLLING".parse::<KickTransport>().unwrap(),
            KickTransport::Polling
        );
        assert!("carrier-pigeon".parse::<KickTransport>().is_err());
    }

    #[test]
    fn test_handshake_messages() {
        let src = source(KickTransport::WebSocket);
        let messages = src.handshake_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::Text("NICK relaybot".into()));
        assert_eq!(messages[1], Message::Text("JOIN #streamer".into()));
    }

    /// Real integration test - connects to the actual Kick IRC gateway.
    /// Run with: cargo test -p chat-aggregator kick::tests::test_real_connection -- --ignored --nocapture
    #[tokio::test]
    #[ignore]
    async fn test_real_connection() {
        let mut src = KickSource::new(
            Client::new(),
            KickConfig {
                channel: "xqc".into(),
                username: None,
                transport: KickTransport::WebSocket,
            },
        );
        let session = src.discover().await.expect("failed to connect");
        let page = tokio::time::timeout(Duration::from_secs(60), src.fetch_next(&session, None))
            .await
            .expect("no frames within 60s")
            .expect("fetch failed");
        for raw in page.items {
            if let Ok(event) = src.parse(raw) {
                println!("{}", event.notification_line());
            }
        }
    }

    #[test]
    fn test_anonymous_nick_when_unconfigured() {
        let src = KickSource::new(
            Client::new(),
            KickConfig {
                channel: "streamer".into(),
                username: None,
                transport: KickTransport::WebSocket,
            },
        );
        assert!(src.nick().starts_with("relay"));
    }
}
