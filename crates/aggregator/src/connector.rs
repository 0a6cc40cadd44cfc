//! Platform connector contract and the shared run loop.
//!
//! A [`ChatSource`] only knows how to discover a live session, fetch the next
//! batch of raw items and parse them; [`run_connector`] owns everything else:
//! status transitions, pacing, backoff, duplicate suppression and the
//! once-per-connection announcement. Connectors never exit on transient
//! failure; every error is classified and resolved into a retry decision.

use crate::backoff::Backoff;
use crate::dedup::SeenWindow;
use crate::error::{ErrorKind, Result};
use crate::event::{ChatEvent, Platform};
use crate::sink::Publisher;
use crate::state::{ConnectionStatus, StateHandle};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Interval between discovery attempts while no live session exists. A miss
/// is expected steady state, not a fault.
pub const DISCOVERY_RETRY_INTERVAL: Duration = Duration::from_secs(15);

/// Default pacing between fetches for polling platforms.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Opaque handle to an active live chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Platform-specific session identifier (live chat id, video id, channel
    /// handle).
    pub id: String,
    /// Human-readable description for logs.
    pub label: String,
}

impl SessionHandle {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// One batch of fetched items.
pub struct FetchPage<R> {
    pub items: Vec<R>,
    /// Replaces the connector cursor unconditionally; `None` means "live
    /// tail" on platforms without a forward cursor.
    pub next_cursor: Option<String>,
    /// Advisory pacing from the platform; takes precedence over the default
    /// poll interval when present.
    pub poll_after: Option<Duration>,
}

impl<R> FetchPage<R> {
    pub fn new(items: Vec<R>) -> Self {
        Self {
            items,
            next_cursor: None,
            poll_after: None,
        }
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.next_cursor = Some(cursor.into());
        self
    }

    pub fn with_poll_after(mut self, delay: Duration) -> Self {
        self.poll_after = Some(delay);
        self
    }
}

/// A platform chat source.
///
/// Implementations stay loop-free: they locate a session, produce one page
/// (or block on one inbound frame for streaming transports) and extract
/// events. The run loop drives them indefinitely.
#[async_trait]
pub trait ChatSource: Send {
    type Raw: Send;

    fn platform(&self) -> Platform;

    /// Locate the platform's currently active live session.
    async fn discover(&mut self) -> Result<SessionHandle>;

    /// Fetch the next page (polling platforms) or block on the next inbound
    /// frame (streaming transports).
    async fn fetch_next(
        &mut self,
        session: &SessionHandle,
        cursor: Option<&str>,
    ) -> Result<FetchPage<Self::Raw>>;

    /// Platform-native message ID used for duplicate suppression; `None`
    /// exempts the item from dedup.
    fn message_id(&self, _raw: &Self::Raw) -> Option<String> {
        None
    }

    /// Extract author and text from a platform payload.
    fn parse(&self, raw: Self::Raw) -> Result<ChatEvent>;

    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }
}

/// Shared environment handed to each connector task.
#[derive(Clone)]
pub struct ConnectorContext {
    /// Outbound queue shared with the relay (many producers, one consumer).
    pub events: mpsc::Sender<ChatEvent>,
    /// Sink used for connection announcements only; chat events go through
    /// the queue.
    pub sink: Arc<dyn Publisher>,
    pub shutdown: CancellationToken,
}

/// Drive one connector until shutdown.
///
/// Status transitions follow Disconnected → Connecting → Live →
/// {BackingOff → Connecting}*; Live is announced to the sink exactly once
/// per transition from a non-Live state. The cursor is replaced by every
/// fetched page and only rewinds on full session rediscovery.
pub async fn run_connector<S: ChatSource>(
    mut source: S,
    ctx: ConnectorContext,
    state: StateHandle,
) {
    let platform = source.platform();
    let mut backoff = Backoff::new();
    let mut seen = SeenWindow::default();

    'discover: loop {
        if ctx.shutdown.is_cancelled() {
            break;
        }
        state.set_status(ConnectionStatus::Connecting);

        let discovered = tokio::select! {
            _ = ctx.shutdown.cancelled() => break 'discover,
            result = source.discover() => result,
        };

        let session = match discovered {
            Ok(session) => session,
            Err(err) if err.kind() == ErrorKind::Discovery => {
                debug!(%platform, %err, "no live session yet");
                state.record_error(err.to_string());
                if sleep_or_shutdown(&ctx.shutdown, DISCOVERY_RETRY_INTERVAL).await {
                    break 'discover;
                }
                continue 'discover;
            }
            Err(err) => {
                warn!(%platform, %err, "discovery failed");
                state.record_error(err.to_string());
                state.set_status(ConnectionStatus::BackingOff);
                let delay = retry_delay(&mut backoff, err.kind());
                if sleep_or_shutdown(&ctx.shutdown, delay).await {
                    break 'discover;
                }
                continue 'discover;
            }
        };

        info!(%platform, session = %session.label, "live session discovered");
        // The only point the cursor rewinds.
        let mut cursor: Option<String> = None;
        state.set_cursor(None);

        loop {
            let fetched = tokio::select! {
                _ = ctx.shutdown.cancelled() => break 'discover,
                result = source.fetch_next(&session, cursor.as_deref()) => result,
            };

            let page = match fetched {
                Ok(page) => page,
                Err(err) => {
                    warn!(%platform, %err, "fetch failed");
                    state.record_error(err.to_string());
                    state.set_status(ConnectionStatus::BackingOff);
                    let delay = retry_delay(&mut backoff, err.kind());
                    if sleep_or_shutdown(&ctx.shutdown, delay).await {
                        break 'discover;
                    }
                    // Full session rediscovery.
                    continue 'discover;
                }
            };

            if state.status() != ConnectionStatus::Live {
                state.set_status(ConnectionStatus::Live);
                state.clear_error();
                announce_live(&ctx, platform).await;
            }
            backoff.reset();

            let wait = page.poll_after.unwrap_or_else(|| source.poll_interval());
            cursor = page.next_cursor;
            state.set_cursor(cursor.clone());

            for raw in page.items {
                if let Some(id) = source.message_id(&raw) {
                    if !seen.insert(&id) {
                        continue;
                    }
                }
                match source.parse(raw) {
                    Ok(event) => {
                        if ctx.events.send(event).await.is_err() {
                            debug!(%platform, "event queue closed, stopping connector");
                            break 'discover;
                        }
                    }
                    // A single malformed item never aborts the loop.
                    Err(err) => warn!(%platform, %err, "dropping malformed item"),
                }
            }

            if sleep_or_shutdown(&ctx.shutdown, wait).await {
                break 'discover;
            }
        }
    }

    state.set_status(ConnectionStatus::Disconnected);
    debug!(%platform, "connector stopped");
}

fn retry_delay(backoff: &mut Backoff, kind: ErrorKind) -> Duration {
    match kind {
        ErrorKind::RateLimit => backoff.rate_limited_delay(),
        _ => backoff.next_delay(),
    }
}

async fn announce_live(ctx: &ConnectorContext, platform: Platform) {
    let text = format!("✅ {platform} connected");
    if let Err(err) = ctx.sink.publish(&text).await {
        warn!(%platform, %err, "failed to announce connection");
    }
}

/// Returns `true` when the shutdown token fired before the delay elapsed.
async fn sleep_or_shutdown(shutdown: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}
