//! Remote start/stop switch fed by the control topic's streaming feed.
//!
//! Commands are edge-triggered: the run flag is written and a confirmation
//! posted only on an actual state change, so repeating a command is a no-op
//! beyond the first.

use crate::backoff::Backoff;
use crate::sink::{NtfyClient, Publisher};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

pub struct ControlChannel {
    feed: NtfyClient,
    control_topic: String,
    sink: Arc<dyn Publisher>,
    running: watch::Sender<bool>,
}

impl ControlChannel {
    pub fn new(
        feed: NtfyClient,
        control_topic: impl Into<String>,
        sink: Arc<dyn Publisher>,
        running: watch::Sender<bool>,
    ) -> Self {
        Self {
            feed,
            control_topic: control_topic.into(),
            sink,
            running,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut backoff = Backoff::new();
        loop {
            let mut stream = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.feed.subscribe(&self.control_topic) => match result {
                    Ok(stream) => {
                        info!(topic = %self.control_topic, "control feed connected");
                        backoff.reset();
                        stream
                    }
                    Err(err) => {
                        warn!(%err, "control feed connection failed");
                        let delay = backoff.next_delay();
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                        continue;
                    }
                },
            };

            loop {
                let line = tokio::select! {
                    _ = shutdown.cancelled() => return,
                    line = stream.next_line() => line,
                };
                match line {
                    Ok(Some(line)) => {
                        if let Some(command) = parse_command(&line) {
                            self.apply(command).await;
                        }
                    }
                    Ok(None) => {
                        debug!("control feed closed");
                        break;
                    }
                    Err(err) => {
                        warn!(%err, "control feed read failed");
                        break;
                    }
                }
            }

            // Reconnect after disconnect.
            let delay = backoff.next_delay();
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        debug!("control channel stopped");
    }

    /// Apply a command to the run flag; confirm only on an actual change.
    pub(crate) async fn apply(&self, command: Command) {
        let desired = command == Command::Start;
        let changed = self.running.send_if_modified(|running| {
            if *running == desired {
                false
            } else {
                *running = desired;
                true
            }
        });

        if !changed {
            debug!(?command, "run state unchanged, ignoring");
            return;
        }

        info!(?command, "run state changed");
        let confirmation = match command {
            Command::Start => "▶️ chat forwarding resumed",
            Command::Stop => "⏹️ chat forwarding stopped",
        };
        if let Err(err) = self.sink.publish(confirmation).await {
            warn!(%err, "failed to post control confirmation");
        }
    }
}

/// Decode one feed line: a JSON event whose `message` field carries the
/// command text. Unrecognized content is ignored.
pub(crate) fn parse_command(line: &str) -> Option<Command> {
    #[derive(Deserialize)]
    struct FeedEvent {
        message: Option<String>,
    }

    let event: FeedEvent = serde_json::from_str(line).ok()?;
    match event.message?.trim().to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "stop" => Some(Command::Stop),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingPublisher;

    fn channel(initially_running: bool) -> (ControlChannel, watch::Receiver<bool>, Arc<RecordingPublisher>) {
        let (running_tx, running_rx) = watch::channel(initially_running);
        let publisher = Arc::new(RecordingPublisher::default());
        let feed = NtfyClient::new(reqwest::Client::new(), "https://ntfy.sh", "chat-notifier");
        let control = ControlChannel::new(feed, "chatcontrol", publisher.clone(), running_tx);
        (control, running_rx, publisher)
    }

    #[test]
    fn test_parse_command_variants() {
        assert_eq!(
            parse_command(r#"{"message": "stop"}"#),
            Some(Command::Stop)
        );
        assert_eq!(
            parse_command(r#"{"message": "  Start "}"#),
            Some(Command::Start)
        );
        assert_eq!(
            parse_command(r#"{"message": "STOP"}"#),
            Some(Command::Stop)
        );
        assert_eq!(parse_command(r#"{"message": "restart"}"#), None);
        // Keepalive events carry no message field.
        assert_eq!(parse_command(r#"{"event": "keepalive"}"#), None);
        assert_eq!(parse_command("not json"), None);
    }

    #[tokio::test]
    async fn test_repeated_stop_confirms_once() {
        let (control, running, publisher) = channel(true);

        control.apply(Command::Stop).await;
        control.apply(Command::Stop).await;

        assert!(!*running.borrow());
        assert_eq!(publisher.texts(), vec!["⏹️ chat forwarding stopped"]);
    }

    #[tokio::test]
    async fn test_start_when_running_is_silent() {
        let (control, running, publisher) = channel(true);

        control.apply(Command::Start).await;

        assert!(*running.borrow());
        assert!(publisher.texts().is_empty());
    }

    #[tokio::test]
    async fn test_stop_then_start_round_trip() {
        let (control, running, publisher) = channel(true);

        control.apply(Command::Stop).await;
        assert!(!*running.borrow());
        control.apply(Command::Start).await;
        assert!(*running.borrow());

        assert_eq!(
            publisher.texts(),
            vec!["⏹️ chat forwarding stopped", "▶️ chat forwarding resumed"]
        );
    }
}
