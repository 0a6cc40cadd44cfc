//! Task supervision.
//!
//! Owns one long-running task per configured connector plus the credential
//! refresh, control channel and relay consumer tasks. Connectors are
//! designed to never exit on transient failure; the supervisor adds no
//! retry of its own. A missing platform configuration skips that connector
//! only; siblings run regardless.

use crate::connector::{ConnectorContext, run_connector};
use crate::control::ControlChannel;
use crate::credentials::{CredentialManager, FacebookAppConfig};
use crate::event::Platform;
use crate::platforms::{FacebookSource, KickConfig, KickSource, YouTubeConfig, YouTubeSource};
use crate::relay::OutboundRelay;
use crate::sink::{NtfyClient, Publisher};
use crate::state::{ConnectionState, StateHandle};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Capacity of the shared outbound queue; producers wait when the relay
/// falls behind.
const QUEUE_CAPACITY: usize = 1024;

const STATUS_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Connection-establishment bound for all outbound HTTP. Whole-request
/// timeouts would kill the long-lived control feed, so only the connect
/// phase is bounded here.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Assembled configuration for the whole pipeline. A platform left `None`
/// is not spawned.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub youtube: Option<YouTubeConfig>,
    pub facebook: Option<FacebookAppConfig>,
    pub kick: Option<KickConfig>,
    pub notify_topic: String,
    pub control_topic: String,
    pub ntfy_base_url: String,
}

pub struct Supervisor {
    config: AggregatorConfig,
    client: Client,
}

impl Supervisor {
    pub fn new(config: AggregatorConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { config, client }
    }

    /// Run the pipeline until the token is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let sink: Arc<dyn Publisher> = Arc::new(NtfyClient::new(
            self.client.clone(),
            self.config.ntfy_base_url.clone(),
            self.config.notify_topic.clone(),
        ));
        let (events_tx, events_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (running_tx, running_rx) = watch::channel(true);

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        let mut states: Vec<watch::Receiver<ConnectionState>> = Vec::new();

        // Single consumer of the shared queue.
        tasks.push(tokio::spawn(
            OutboundRelay::new(events_rx, sink.clone(), running_rx).run(shutdown.clone()),
        ));

        // Remote start/stop switch; sole writer of the run flag.
        let feed = NtfyClient::new(
            self.client.clone(),
            self.config.ntfy_base_url.clone(),
            self.config.notify_topic.clone(),
        );
        let control = ControlChannel::new(
            feed,
            self.config.control_topic.clone(),
            sink.clone(),
            running_tx,
        );
        tasks.push(tokio::spawn(control.run(shutdown.clone())));

        let ctx = ConnectorContext {
            events: events_tx,
            sink: sink.clone(),
            shutdown: shutdown.clone(),
        };

        if let Some(youtube) = self.config.youtube.clone() {
            let (state, state_rx) = StateHandle::new(Platform::YouTube);
            states.push(state_rx);
            let source = YouTubeSource::new(self.client.clone(), youtube);
            tasks.push(tokio::spawn(run_connector(source, ctx.clone(), state)));
        } else {
            info!("youtube connector not configured, skipping");
        }

        if let Some(facebook) = self.config.facebook.clone() {
            let page_id = facebook.page_id.clone();
            let manager = CredentialManager::new(self.client.clone(), facebook);
            let credentials = manager.subscribe();
            tasks.push(tokio::spawn(manager.run(shutdown.clone())));

            let (state, state_rx) = StateHandle::new(Platform::Facebook);
            states.push(state_rx);
            let source = FacebookSource::new(self.client.clone(), page_id, credentials);
            tasks.push(tokio::spawn(run_connector(source, ctx.clone(), state)));
        } else {
            info!("facebook connector not configured, skipping");
        }

        if let Some(kick) = self.config.kick.clone() {
            let (state, state_rx) = StateHandle::new(Platform::Kick);
            states.push(state_rx);
            let source = KickSource::new(self.client.clone(), kick);
            tasks.push(tokio::spawn(run_connector(source, ctx.clone(), state)));
        } else {
            info!("kick connector not configured, skipping");
        }

        // Release the supervisor's queue sender so the relay drains fully
        // once every connector is gone.
        drop(ctx);

        // Read-only status reporting from the connectors' watch channels.
        let report_shutdown = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(STATUS_REPORT_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = report_shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        for state in &states {
                            let snapshot = state.borrow().clone();
                            debug!(
                                platform = %snapshot.platform,
                                status = ?snapshot.status,
                                cursor = ?snapshot.cursor,
                                last_error = ?snapshot.last_error,
                                "connector status"
                            );
                        }
                    }
                }
            }
        }));

        shutdown.cancelled().await;
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
        info!("supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> AggregatorConfig {
        AggregatorConfig {
            youtube: None,
            facebook: None,
            kick: None,
            notify_topic: "chat-notifier".into(),
            control_topic: "chatcontrol".into(),
            ntfy_base_url: "https://ntfy.sh".into(),
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let shutdown = CancellationToken::new();
        let supervisor = Supervisor::new(empty_config());
        let task = tokio::spawn(supervisor.run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("supervisor did not stop")
            .unwrap();
    }
}
