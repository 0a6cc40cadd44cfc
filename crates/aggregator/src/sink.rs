//! Notification sink client: publish-only POST to a named topic, plus the
//! streaming JSON feed used by the control channel.

use crate::error::{ConnectorError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Outbound seam to the notification sink. Delivery is fire-and-forget; a
/// failed publish surfaces as an error for the caller to log, never to retry.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str) -> Result<()>;
}

/// ntfy-style topic client: `POST {base}/{topic}` publishes a UTF-8 text
/// body, `GET {base}/{topic}/json` streams newline-delimited JSON events.
#[derive(Debug, Clone)]
pub struct NtfyClient {
    client: reqwest::Client,
    base_url: String,
    topic: String,
}

impl NtfyClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            topic: topic.into(),
        }
    }

    /// Open the live JSON feed for a topic on the same server.
    pub async fn subscribe(&self, topic: &str) -> Result<LineStream> {
        let url = format!("{}/{}/json", self.base_url, topic);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::from_status(status, "subscribe"));
        }
        Ok(LineStream::new(
            response.bytes_stream().map(|chunk| chunk.map_err(ConnectorError::from)),
        ))
    }
}

#[async_trait]
impl Publisher for NtfyClient {
    async fn publish(&self, text: &str) -> Result<()> {
        let url = format!("{}/{}", self.base_url, self.topic);
        let response = self
            .client
            .post(&url)
            .body(text.to_string())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::from_status(status, "publish"));
        }
        Ok(())
    }
}

/// Buffers a byte stream and yields complete lines; partial lines wait for
/// the next chunk.
pub struct LineStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
}

impl LineStream {
    pub fn new(stream: impl Stream<Item = Result<Bytes>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
            buffer: Vec::new(),
        }
    }

    /// Next non-empty line, or `None` once the feed closes.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line[..pos]).trim().to_string();
                if text.is_empty() {
                    continue;
                }
                return Ok(Some(text));
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(e),
                None => return Ok(None),
            }
        }
    }
}
