//! Outbound relay: the single consumer draining the shared event queue.
//!
//! Delivery is paced by a minimum inter-send interval and gated by the run
//! flag. Pausing holds the dequeued event until the flag flips back; an
//! event is never dropped because the system is paused. Each event gets
//! exactly one delivery attempt.

use crate::event::ChatEvent;
use crate::sink::Publisher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default minimum gap between consecutive posts to the sink.
pub const MIN_SEND_INTERVAL: Duration = Duration::from_secs(2);

pub struct OutboundRelay {
    queue: mpsc::Receiver<ChatEvent>,
    sink: Arc<dyn Publisher>,
    running: watch::Receiver<bool>,
    min_interval: Duration,
}

impl OutboundRelay {
    pub fn new(
        queue: mpsc::Receiver<ChatEvent>,
        sink: Arc<dyn Publisher>,
        running: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            sink,
            running,
            min_interval: MIN_SEND_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        if let Err(err) = self.sink.publish("✅ relay worker connected").await {
            warn!(%err, "failed to announce relay startup");
        }

        let mut last_send: Option<Instant> = None;
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = self.queue.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            // Paused: hold the event until running flips true.
            if !*self.running.borrow() {
                debug!("relay paused, holding event");
                let resumed = tokio::select! {
                    _ = shutdown.cancelled() => false,
                    result = self.running.wait_for(|running| *running) => result.is_ok(),
                };
                if !resumed {
                    break;
                }
            }

            if let Some(previous) = last_send {
                let elapsed = previous.elapsed();
                if elapsed < self.min_interval {
                    let gap = self.min_interval - elapsed;
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(gap) => {}
                    }
                }
            }

            last_send = Some(Instant::now());
            // At-most-once: a failed post is logged and the event dropped.
            if let Err(err) = self.sink.publish(&event.notification_line()).await {
                warn!(%err, platform = %event.platform, "failed to post notification");
            }
        }
        debug!("relay consumer stopped");
    }
}
