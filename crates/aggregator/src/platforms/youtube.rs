//! YouTube Live chat source (polling).
//!
//! Discovery finds the channel's active broadcast (optionally pinned to a
//! configured video id) and resolves its live chat id; fetching walks the
//! paginated message list with the opaque continuation token the API returns.

use crate::connector::{ChatSource, FetchPage, SessionHandle};
use crate::error::{ConnectorError, Result};
use crate::event::{ChatEvent, Platform};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub api_key: String,
    pub channel_id: String,
    /// Pins discovery to a specific video instead of searching the channel
    /// for an active broadcast.
    pub video_id: Option<String>,
}

pub struct YouTubeSource {
    client: Client,
    config: YouTubeConfig,
}

impl YouTubeSource {
    pub fn new(client: Client, config: YouTubeConfig) -> Self {
        Self { client, config }
    }

    async fn find_live_video(&self) -> Result<String> {
        if let Some(video_id) = &self.config.video_id {
            return Ok(video_id.clone());
        }

        let url = format!("{API_BASE}/search");
        let response: SearchResponse = self
            .get_json(
                &url,
                &[
                    ("part", "snippet"),
                    ("channelId", &self.config.channel_id),
                    ("type", "video"),
                    ("eventType", "live"),
                    ("key", &self.config.api_key),
                ],
            )
            .await?;

        response
            .items
            .into_iter()
            .next()
            .map(|item| item.id.video_id)
            .ok_or_else(|| ConnectorError::Discovery("no live stream on channel".into()))
    }

    async fn live_chat_id(&self, video_id: &str) -> Result<String> {
        let url = format!("{API_BASE}/videos");
        let response: VideoListResponse = self
            .get_json(
                &url,
                &[
                    ("part", "liveStreamingDetails"),
                    ("id", video_id),
                    ("key", &self.config.api_key),
                ],
            )
            .await?;

        response
            .items
            .into_iter()
            .next()
            .and_then(|item| item.live_streaming_details)
            .and_then(|details| details.active_live_chat_id)
            .ok_or_else(|| ConnectorError::Discovery("broadcast has no active live chat".into()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::from_status(status, "youtube api"));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ChatSource for YouTubeSource {
    type Raw = LiveChatMessage;

    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    async fn discover(&mut self) -> Result<SessionHandle> {
        let video_id = self.find_live_video().await?;
        let chat_id = self.live_chat_id(&video_id).await?;
        Ok(SessionHandle::new(chat_id, format!("video {video_id}")))
    }

    async fn fetch_next(
        &mut self,
        session: &SessionHandle,
        cursor: Option<&str>,
    ) -> Result<FetchPage<LiveChatMessage>> {
        let url = format!("{API_BASE}/liveChat/messages");
        let mut query = vec![
            ("liveChatId", session.id.as_str()),
            ("part", "snippet,authorDetails"),
            ("key", self.config.api_key.as_str()),
        ];
        if let Some(token) = cursor {
            query.push(("pageToken", token));
        }

        let response: MessageListResponse = self.get_json(&url, &query).await?;
        Ok(page_from(response))
    }

    fn parse(&self, raw: LiveChatMessage) -> Result<ChatEvent> {
        let author = raw
            .author_details
            .ok_or_else(|| ConnectorError::Parse("message missing authorDetails".into()))?
            .display_name;
        let text = raw
            .snippet
            .and_then(|snippet| snippet.display_message)
            .ok_or_else(|| ConnectorError::Parse("message missing displayMessage".into()))?;
        Ok(ChatEvent::new(Platform::YouTube, author, text))
    }
}

fn page_from(response: MessageListResponse) -> FetchPage<LiveChatMessage> {
    let mut page = FetchPage::new(response.items);
    if let Some(token) = response.next_page_token {
        page = page.with_cursor(token);
    }
    if let Some(millis) = response.polling_interval_millis {
        page = page.with_poll_after(Duration::from_millis(millis));
    }
    page
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingDetails {
    active_live_chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    items: Vec<LiveChatMessage>,
    next_page_token: Option<String>,
    polling_interval_millis: Option<u64>,
}

/// One `liveChatMessage` resource, reduced to the fields the relay needs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessage {
    snippet: Option<MessageSnippet>,
    author_details: Option<AuthorDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageSnippet {
    display_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorDetails {
    display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> YouTubeSource {
        YouTubeSource::new(
            Client::new(),
            YouTubeConfig {
                api_key: "key".into(),
                channel_id: "chan".into(),
                video_id: None,
            },
        )
    }

    #[test]
    fn test_message_list_page() {
        let json = r#"{
            "items": [
                {
                    "snippet": {"displayMessage": "hi"},
                    "authorDetails": {"displayName": "Ann"}
                }
            ],
            "nextPageToken": "p1",
            "pollingIntervalMillis": 7000
        }"#;
        let response: MessageListResponse = serde_json::from_str(json).unwrap();
        let page = page_from(response);

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("p1"));
        assert_eq!(page.poll_after, Some(Duration::from_millis(7000)));
    }

    #[test]
    fn test_page_without_advisory_interval() {
        let response: MessageListResponse = serde_json::from_str(r#"{"items": []}"#).unwrap();
        let page = page_from(response);
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
        assert!(page.poll_after.is_none());
    }

    #[test]
    fn test_parse_message() {
        let raw: LiveChatMessage = serde_json::from_str(
            r#"{"snippet": {"displayMessage": "hello"}, "authorDetails": {"displayName": "Ann"}}"#,
        )
        .unwrap();
        let event = source().parse(raw).unwrap();
        assert_eq!(event.platform, Platform::YouTube);
        assert_eq!(event.author, "Ann");
        assert_eq!(event.text, "hello");
    }

    #[test]
    fn test_parse_deleted_message_is_parse_error() {
        // A message being deleted has no displayMessage.
        let raw: LiveChatMessage =
            serde_json::from_str(r#"{"snippet": {}, "authorDetails": {"displayName": "Ann"}}"#)
                .unwrap();
        assert!(source().parse(raw).is_err());
    }

    #[test]
    fn test_search_response_video_id() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"items": [{"id": {"kind": "youtube#video", "videoId": "v1"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.items[0].id.video_id, "v1");
    }

    #[test]
    fn test_video_response_live_chat_id() {
        let response: VideoListResponse = serde_json::from_str(
            r#"{"items": [{"liveStreamingDetails": {"activeLiveChatId": "chat1"}}]}"#,
        )
        .unwrap();
        let chat_id = response.items[0]
            .live_streaming_details
            .as_ref()
            .and_then(|d| d.active_live_chat_id.as_deref());
        assert_eq!(chat_id, Some("chat1"));
    }
}
