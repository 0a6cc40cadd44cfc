//! Small shared layer for Facebook Graph API calls.

use crate::error::{ConnectorError, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub(crate) const GRAPH_BASE: &str = "https://graph.facebook.com";

/// Error envelope returned by the Graph API on non-success responses.
#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<i64>,
}

/// Classify a failed Graph response. OAuth failures (including an expired
/// page token) must surface as auth errors so the connector escalates via
/// backoff instead of treating them as plain transport faults.
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> ConnectorError {
    if let Ok(envelope) = serde_json::from_str::<GraphErrorBody>(body) {
        let detail = envelope.error;
        let message = detail.message.unwrap_or_else(|| status.to_string());
        let code = detail.code.unwrap_or_default();
        if detail.kind.as_deref() == Some("OAuthException") || code == 190 {
            return ConnectorError::Auth(message);
        }
        // Graph throttling codes: 4 (app), 17 (user), 32 (page).
        if matches!(code, 4 | 17 | 32) || status == StatusCode::TOO_MANY_REQUESTS {
            return ConnectorError::RateLimited;
        }
        return ConnectorError::Other(message);
    }
    ConnectorError::from_status(status, "graph api")
}

/// Issue a GET and decode the JSON body, mapping Graph error envelopes.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T> {
    let response = client.get(url).query(query).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_failure(status, &body));
    }
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_oauth_exception_maps_to_auth() {
        let body = r#"{"error":{"message":"Error validating access token","type":"OAuthException","code":190}}"#;
        let err = classify_failure(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[test]
    fn test_throttle_code_maps_to_rate_limit() {
        let body = r#"{"error":{"message":"Application request limit reached","type":"ApiError","code":4}}"#;
        let err = classify_failure(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.kind(), ErrorKind::RateLimit);
    }

    #[test]
    fn test_unparseable_body_falls_back_to_status() {
        let err = classify_failure(StatusCode::SERVICE_UNAVAILABLE, "<html>upstream down</html>");
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
