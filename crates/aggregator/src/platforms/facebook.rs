//! Facebook Live chat source (comment polling).
//!
//! Discovery lists the page's live videos and picks the one with LIVE
//! status; fetching polls the live-comments endpoint. The endpoint returns
//! overlapping recent windows rather than a forward cursor, so comments are
//! deduplicated by their platform-native ID.

use crate::connector::{ChatSource, FetchPage, SessionHandle};
use crate::credentials::Credential;
use crate::error::{ConnectorError, Result};
use crate::event::{ChatEvent, Platform};
use crate::platforms::graph::{self, GRAPH_BASE};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::watch;

pub struct FacebookSource {
    client: Client,
    page_id: String,
    /// Read-only view of the credential manager's current page token.
    credentials: watch::Receiver<Option<Credential>>,
}

impl FacebookSource {
    pub fn new(
        client: Client,
        page_id: impl Into<String>,
        credentials: watch::Receiver<Option<Credential>>,
    ) -> Self {
        Self {
            client,
            page_id: page_id.into(),
            credentials,
        }
    }

    fn page_token(&self) -> Result<String> {
        self.credentials
            .borrow()
            .as_ref()
            .map(|credential| credential.value.clone())
            .ok_or_else(|| ConnectorError::Auth("no page credential available yet".into()))
    }
}

#[async_trait]
impl ChatSource for FacebookSource {
    type Raw = Comment;

    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn discover(&mut self) -> Result<SessionHandle> {
        let token = self.page_token()?;
        let url = format!("{GRAPH_BASE}/{}/live_videos", self.page_id);
        let response: LiveVideoListResponse = graph::get_json(
            &self.client,
            &url,
            &[("fields", "id,status"), ("access_token", token.as_str())],
        )
        .await?;

        response
            .data
            .into_iter()
            .find(|video| video.status.as_deref() == Some("LIVE"))
            .map(|video| {
                let label = format!("live video {}", video.id);
                SessionHandle::new(video.id, label)
            })
            .ok_or_else(|| ConnectorError::Discovery("no live video on page".into()))
    }

    async fn fetch_next(
        &mut self,
        session: &SessionHandle,
        _cursor: Option<&str>,
    ) -> Result<FetchPage<Comment>> {
        let token = self.page_token()?;
        let url = format!("{GRAPH_BASE}/{}/comments", session.id);
        let response: CommentListResponse = graph::get_json(
            &self.client,
            &url,
            &[
                ("live_filter", "stream"),
                ("fields", "id,from,message"),
                ("access_token", token.as_str()),
            ],
        )
        .await?;

        // No forward cursor here; each poll re-reads the live tail and the
        // seen-ID window suppresses the overlap.
        Ok(FetchPage::new(response.data))
    }

    fn message_id(&self, raw: &Comment) -> Option<String> {
        Some(raw.id.clone())
    }

    fn parse(&self, raw: Comment) -> Result<ChatEvent> {
        let author = raw
            .from
            .ok_or_else(|| ConnectorError::Parse("comment missing author".into()))?
            .name;
        let text = raw
            .message
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ConnectorError::Parse("comment missing message".into()))?;
        Ok(ChatEvent::new(Platform::Facebook, author, text))
    }
}

#[derive(Debug, Deserialize)]
struct LiveVideoListResponse {
    #[serde(default)]
    data: Vec<LiveVideo>,
}

#[derive(Debug, Deserialize)]
struct LiveVideo {
    id: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentListResponse {
    #[serde(default)]
    data: Vec<Comment>,
}

/// One comment from the live-comments endpoint.
#[derive(Debug, Deserialize)]
pub struct Comment {
    id: String,
    from: Option<CommentAuthor>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentAuthor {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credential, CredentialKind};

    fn source_with_token(token: Option<&str>) -> FacebookSource {
        let (_tx, rx) =
            watch::channel(token.map(|t| Credential::new(CredentialKind::PageToken, t)));
        FacebookSource::new(Client::new(), "page1", rx)
    }

    #[test]
    fn test_missing_credential_is_auth_error() {
        let source = source_with_token(None);
        let err = source.page_token().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Auth);
    }

    #[test]
    fn test_page_token_reads_current_value() {
        let source = source_with_token(Some("tok-1"));
        assert_eq!(source.page_token().unwrap(), "tok-1");
    }

    #[test]
    fn test_live_video_selection() {
        let response: LiveVideoListResponse = serde_json::from_str(
            r#"{"data": [
                {"id": "100", "status": "VOD"},
                {"id": "200", "status": "LIVE"},
                {"id": "300", "status": "LIVE"}
            ]}"#,
        )
        .unwrap();
        let live = response
            .data
            .into_iter()
            .find(|v| v.status.as_deref() == Some("LIVE"))
            .unwrap();
        assert_eq!(live.id, "200");
    }

    #[test]
    fn test_parse_comment() {
        let source = source_with_token(Some("tok"));
        let raw: Comment = serde_json::from_str(
            r#"{"id": "c1", "from": {"name": "Ann"}, "message": "hello"}"#,
        )
        .unwrap();
        assert_eq!(source.message_id(&raw).as_deref(), Some("c1"));
        let event = source.parse(raw).unwrap();
        assert_eq!(event.platform, Platform::Facebook);
        assert_eq!(event.author, "Ann");
        assert_eq!(event.text, "hello");
    }

    #[test]
    fn test_comment_without_author_is_parse_error() {
        let source = source_with_token(Some("tok"));
        let raw: Comment = serde_json::from_str(r#"{"id": "c2", "message": "hi"}"#).unwrap();
        assert!(source.parse(raw).is_err());
    }

    #[test]
    fn test_empty_message_is_parse_error() {
        let source = source_with_token(Some("tok"));
        let raw: Comment =
            serde_json::from_str(r#"{"id": "c3", "from": {"name": "Ann"}, "message": ""}"#)
                .unwrap();
        assert!(source.parse(raw).is_err());
    }
}
