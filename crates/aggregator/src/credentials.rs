//! Facebook credential lifecycle.
//!
//! The manager owns the token chain: the configured user token is exchanged
//! for a fresh long-lived token, which is then exchanged for a page-scoped
//! token. The page credential is published through a watch channel and
//! replaced as a whole value on every refresh, so a reader never observes a
//! partially-updated token. On refresh failure the previous (possibly
//! stale) credential is retained; the connector surfaces the resulting
//! platform-side auth failures through its own backoff.

use crate::backoff::Backoff;
use crate::error::{ConnectorError, Result};
use crate::platforms::graph::{self, GRAPH_BASE};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const MAX_REFRESH_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    UserToken,
    PageToken,
}

/// A token with its provenance. Replaced atomically, never mutated in place.
#[derive(Debug, Clone)]
pub struct Credential {
    pub kind: CredentialKind,
    pub value: String,
    pub obtained_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(kind: CredentialKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            obtained_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FacebookAppConfig {
    pub app_id: String,
    pub app_secret: String,
    /// Long- or short-lived user token supplied by the deployment; exchanged
    /// on every refresh cycle.
    pub user_token: String,
    pub page_id: String,
}

pub struct CredentialManager {
    client: Client,
    config: FacebookAppConfig,
    current: watch::Sender<Option<Credential>>,
}

impl CredentialManager {
    pub fn new(client: Client, config: FacebookAppConfig) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            client,
            config,
            current,
        }
    }

    /// Read-only view of the current page credential.
    pub fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.current.subscribe()
    }

    /// Exchange the configured user token for a fresh long-lived one.
    async fn refresh_user_token(&self) -> Result<Credential> {
        let url = format!("{GRAPH_BASE}/v17.0/oauth/access_token");
        let response: TokenResponse = graph::get_json(
            &self.client,
            &url,
            &[
                ("grant_type", "fb_exchange_token"),
                ("client_id", self.config.app_id.as_str()),
                ("client_secret", self.config.app_secret.as_str()),
                ("fb_exchange_token", self.config.user_token.as_str()),
            ],
        )
        .await?;

        response
            .access_token
            .map(|token| Credential::new(CredentialKind::UserToken, token))
            .ok_or_else(|| ConnectorError::Auth("token exchange returned no access token".into()))
    }

    /// Exchange a user token for the page-scoped token.
    async fn derive_page_token(&self, user: &Credential) -> Result<Credential> {
        let url = format!("{GRAPH_BASE}/{}", self.config.page_id);
        let response: TokenResponse = graph::get_json(
            &self.client,
            &url,
            &[
                ("fields", "access_token"),
                ("access_token", user.value.as_str()),
            ],
        )
        .await?;

        response
            .access_token
            .map(|token| Credential::new(CredentialKind::PageToken, token))
            .ok_or_else(|| ConnectorError::Auth("page token derivation returned no token".into()))
    }

    fn install(&self, credential: Credential) {
        // Whole-value swap; readers see either the old or the new token.
        self.current.send_replace(Some(credential));
    }

    /// One full refresh cycle with bounded retries.
    pub async fn refresh(&self) -> Result<Credential> {
        let mut backoff = Backoff::new();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = async {
                let user = self.refresh_user_token().await?;
                self.derive_page_token(&user).await
            }
            .await;

            match result {
                Ok(credential) => {
                    self.install(credential.clone());
                    return Ok(credential);
                }
                Err(err) if attempt < MAX_REFRESH_ATTEMPTS => {
                    warn!(attempt, %err, "credential refresh attempt failed");
                    tokio::time::sleep(backoff.next_delay()).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Scheduled refresh task. A failed cycle keeps the previous credential.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            match self.refresh().await {
                Ok(_) => info!("facebook page credential refreshed"),
                Err(err) => {
                    warn!(%err, "credential refresh failed, keeping previous token")
                }
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(REFRESH_INTERVAL) => {}
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> CredentialManager {
        CredentialManager::new(
            Client::new(),
            FacebookAppConfig {
                app_id: "app".into(),
                app_secret: "secret".into(),
                user_token: "user-token".into(),
                page_id: "page1".into(),
            },
        )
    }

    #[test]
    fn test_install_swaps_whole_value() {
        let manager = manager();
        let reader = manager.subscribe();
        assert!(reader.borrow().is_none());

        manager.install(Credential::new(CredentialKind::PageToken, "tok-1"));
        {
            let seen = reader.borrow();
            let credential = seen.as_ref().unwrap();
            assert_eq!(credential.kind, CredentialKind::PageToken);
            assert_eq!(credential.value, "tok-1");
        }

        manager.install(Credential::new(CredentialKind::PageToken, "tok-2"));
        // A reader observes the fully-new value, never a mix.
        assert_eq!(reader.borrow().as_ref().unwrap().value, "tok-2");
    }

    #[test]
    fn test_token_response_with_missing_field() {
        let response: TokenResponse = serde_json::from_str("{}").unwrap();
        assert!(response.access_token.is_none());

        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc", "token_type": "bearer"}"#).unwrap();
        assert_eq!(response.access_token.as_deref(), Some("abc"));
    }
}
