//! Live chat aggregation engine.
//!
//! Per-platform connectors discover an active live session on YouTube,
//! Facebook or Kick and feed normalized [`ChatEvent`]s into a shared queue;
//! the [`relay::OutboundRelay`] drains the queue at a bounded rate and posts
//! each message to a notification topic, gated by a remote start/stop
//! switch listening on a second topic.

pub mod backoff;
pub mod connector;
pub mod control;
pub mod credentials;
pub mod dedup;
pub mod error;
pub mod event;
pub mod platforms;
pub mod relay;
pub mod sink;
pub mod state;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testutil;

pub use connector::{ChatSource, ConnectorContext, FetchPage, SessionHandle, run_connector};
pub use error::{ConnectorError, ErrorKind, Result};
pub use event::{ChatEvent, Platform};
pub use sink::{NtfyClient, Publisher};
pub use supervisor::{AggregatorConfig, Supervisor};
