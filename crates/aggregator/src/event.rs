//! Normalized chat message model shared by all connectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source platform of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    YouTube,
    Facebook,
    Kick,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::YouTube => write!(f, "YouTube"),
            Platform::Facebook => write!(f, "Facebook"),
            Platform::Kick => write!(f, "Kick"),
        }
    }
}

/// A single chat message, normalized across platforms. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    pub platform: Platform,
    /// Display name of the sender.
    pub author: String,
    /// Message content.
    pub text: String,
    /// Timestamp when the connector observed the message.
    pub observed_at: DateTime<Utc>,
}

impl ChatEvent {
    pub fn new(platform: Platform, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            platform,
            author: author.into(),
            text: text.into(),
            observed_at: Utc::now(),
        }
    }

    /// Render the event in the sink's line format.
    pub fn notification_line(&self) -> String {
        format!("[{}] {}: {}", self.platform, self.author, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_display() {
        assert_eq!(Platform::YouTube.to_string(), "YouTube");
        assert_eq!(Platform::Facebook.to_string(), "Facebook");
        assert_eq!(Platform::Kick.to_string(), "Kick");
    }

    #[test]
    fn test_notification_line() {
        let event = ChatEvent::new(Platform::Kick, "Ann", "hello there");
        assert_eq!(event.notification_line(), "[Kick] Ann: hello there");
    }
}
