//! Shared test doubles.

use crate::error::Result;
use crate::sink::Publisher;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::time::Instant;

/// In-memory [`Publisher`] recording every published line with its send time.
#[derive(Default)]
pub(crate) struct RecordingPublisher {
    messages: Mutex<Vec<(Instant, String)>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, text: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((Instant::now(), text.to_string()));
        Ok(())
    }
}

impl RecordingPublisher {
    pub(crate) fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub(crate) fn timed(&self) -> Vec<(Instant, String)> {
        self.messages.lock().unwrap().clone()
    }
}
