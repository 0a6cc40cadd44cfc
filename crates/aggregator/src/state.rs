//! Per-connector connection state, published for read-only status reporting.

use crate::event::Platform;
use tokio::sync::watch;

/// Lifecycle status of one platform connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    /// Session discovery in flight.
    Connecting,
    /// At least one successful fetch on the current session.
    Live,
    /// Sleeping out a failure before retrying.
    BackingOff,
}

/// Snapshot of one connector's state. Exactly one instance exists per
/// platform; only the owning connector writes it.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub platform: Platform,
    pub status: ConnectionStatus,
    /// Platform-specific pagination token; advances monotonically and only
    /// rewinds on full session rediscovery.
    pub cursor: Option<String>,
    pub last_error: Option<String>,
}

impl ConnectionState {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            status: ConnectionStatus::Disconnected,
            cursor: None,
            last_error: None,
        }
    }
}

/// Write half held by the connector driver; receivers see whole-value
/// snapshots.
pub struct StateHandle {
    tx: watch::Sender<ConnectionState>,
}

impl StateHandle {
    pub fn new(platform: Platform) -> (Self, watch::Receiver<ConnectionState>) {
        let (tx, rx) = watch::channel(ConnectionState::new(platform));
        (Self { tx }, rx)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.tx.borrow().status
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        self.tx.send_modify(|state| state.status = status);
    }

    pub fn set_cursor(&self, cursor: Option<String>) {
        self.tx.send_modify(|state| state.cursor = cursor);
    }

    pub fn record_error(&self, message: String) {
        self.tx.send_modify(|state| state.last_error = Some(message));
    }

    pub fn clear_error(&self) {
        self.tx.send_modify(|state| state.last_error = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_sees_updates() {
        let (handle, rx) = StateHandle::new(Platform::YouTube);
        assert_eq!(rx.borrow().status, ConnectionStatus::Disconnected);

        handle.set_status(ConnectionStatus::Connecting);
        handle.set_cursor(Some("p1".to_string()));
        handle.record_error("boom".to_string());

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.status, ConnectionStatus::Connecting);
        assert_eq!(snapshot.cursor.as_deref(), Some("p1"));
        assert_eq!(snapshot.last_error.as_deref(), Some("boom"));

        handle.clear_error();
        assert!(rx.borrow().last_error.is_none());
    }
}
