//! Connection state and its change notification.
//!
//! [`StateStore`] wraps a `tokio::sync::watch` channel: the tracker is the
//! only writer, and any number of consumers hold receivers that always see
//! the latest snapshot.

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::TrackingError;

/// Snapshot of a tracker's connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionState<T> {
    /// A fetch is in flight.
    pub is_loading: bool,
    /// The most recent fetch succeeded.
    pub is_connected: bool,
    /// The unresolved failure, if any.
    pub error: Option<TrackingError>,
    /// When the last successful fetch completed.
    pub last_update: Option<Instant>,
    /// Consecutive retryable failures since the last success or clear.
    pub retry_count: u32,
    /// Payload of the last successful fetch.
    pub data: Option<T>,
}

impl<T> Default for ConnectionState<T> {
    fn default() -> Self {
        Self {
            is_loading: false,
            is_connected: false,
            error: None,
            last_update: None,
            retry_count: 0,
            data: None,
        }
    }
}

impl<T> ConnectionState<T> {
    /// True if an error is waiting to be resolved.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Single-writer state cell with subscriber notification.
#[derive(Debug)]
pub struct StateStore<T> {
    tx: watch::Sender<ConnectionState<T>>,
}

impl<T> Default for StateStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StateStore<T> {
    /// A store holding the initial idle state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::default());
        Self { tx }
    }

    /// A receiver that observes every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState<T>> {
        self.tx.subscribe()
    }

    /// Apply a mutation and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut ConnectionState<T>)) {
        self.tx.send_modify(f);
    }

    /// Apply a mutation; subscribers are notified only if `f` returns true.
    pub fn update_if(&self, f: impl FnOnce(&mut ConnectionState<T>) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }

    /// Read a field without cloning the whole snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&ConnectionState<T>) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Whether an error is currently unresolved.
    pub fn has_error(&self) -> bool {
        self.read(|s| s.error.is_some())
    }

    /// Number of live receivers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone> StateStore<T> {
    /// Clone the current snapshot.
    pub fn snapshot(&self) -> ConnectionState<T> {
        self.tx.borrow().clone()
    }
}
