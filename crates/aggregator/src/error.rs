use reqwest::StatusCode;
use thiserror::Error;

/// Classification of a connector failure, the single input to the retry
/// decision made by the connector run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No active live session; expected steady state, retried on a medium
    /// interval.
    Discovery,
    /// Token exchange/derivation or platform-side authorization failure.
    Auth,
    /// Network or socket failure; backoff and reconnect.
    Transport,
    /// A malformed payload or item.
    Parse,
    /// Platform throttling; escalates backoff beyond the normal ceiling.
    RateLimit,
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("no active live session: {0}")]
    Discovery(String),
    #[error("authorization failed: {0}")]
    Auth(String),
    #[error("rate limited by platform")]
    RateLimited,
    #[error("malformed item: {0}")]
    Parse(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ConnectorError>;

impl ConnectorError {
    /// Every error maps to exactly one [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectorError::Discovery(_) => ErrorKind::Discovery,
            ConnectorError::Auth(_) => ErrorKind::Auth,
            ConnectorError::RateLimited => ErrorKind::RateLimit,
            ConnectorError::Parse(_) | ConnectorError::Json(_) => ErrorKind::Parse,
            ConnectorError::Http(e) => match e.status() {
                Some(StatusCode::TOO_MANY_REQUESTS) => ErrorKind::RateLimit,
                Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN) => ErrorKind::Auth,
                _ => ErrorKind::Transport,
            },
            ConnectorError::WebSocket(_) | ConnectorError::Io(_) | ConnectorError::Other(_) => {
                ErrorKind::Transport
            }
        }
    }

    /// Map a non-success HTTP status to an error before the body is read.
    pub fn from_status(status: StatusCode, context: &str) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS => ConnectorError::RateLimited,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ConnectorError::Auth(format!("{context}: {status}"))
            }
            _ => ConnectorError::Other(format!("{context}: unexpected status {status}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ConnectorError::Discovery("no stream".into()).kind(),
            ErrorKind::Discovery
        );
        assert_eq!(ConnectorError::Auth("expired".into()).kind(), ErrorKind::Auth);
        assert_eq!(ConnectorError::RateLimited.kind(), ErrorKind::RateLimit);
        assert_eq!(ConnectorError::Parse("bad".into()).kind(), ErrorKind::Parse);
        assert_eq!(
            ConnectorError::Other("socket closed".into()).kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn test_from_status() {
        assert_eq!(
            ConnectorError::from_status(StatusCode::TOO_MANY_REQUESTS, "poll").kind(),
            ErrorKind::RateLimit
        );
        assert_eq!(
            ConnectorError::from_status(StatusCode::FORBIDDEN, "poll").kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            ConnectorError::from_status(StatusCode::BAD_GATEWAY, "poll").kind(),
            ErrorKind::Transport
        );
    }
}
