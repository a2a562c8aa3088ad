//! # livetrack
//!
//! A connection controller for live-tracking style data feeds.
//!
//! A [`Tracker`] polls a caller-supplied data source on a fixed interval,
//! bounds every fetch with a timeout, and recovers from transient failures
//! with exponential backoff. Consumers observe a single
//! [`ConnectionState`] through a watch channel and drive recovery with
//! [`Tracker::retry`] and [`Tracker::clear_error`].
//!
//! The pieces are usable on their own:
//!
//! - [`classify`](mod@classify): raw failure → [`TrackingError`] with a retryability flag
//! - [`fetch`]: fetch-with-timeout and the single-in-flight [`FetchGate`]
//! - [`scheduler`]: the pure retry/backoff state machine
//! - [`state`]: the connection state store
//! - [`tracker`]: the polling loop that wires them together
//!
//! ## Quick Example
//!
//! ```rust
//! use livetrack::{FetchError, RetryPolicy, Tracker, TrackerConfig};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position {
//!     lat: f64,
//!     lon: f64,
//! }
//!
//! async fn read_position(_cancel: CancellationToken) -> Result<Position, FetchError> {
//!     Ok(Position { lat: 52.52, lon: 13.40 })
//! }
//!
//! # tokio_test::block_on(async {
//! let config = TrackerConfig::new(Duration::from_secs(5)).with_policy(
//!     RetryPolicy::exponential(Duration::from_secs(1))
//!         .with_max_retries(3)
//!         .with_timeout(Duration::from_secs(10)),
//! );
//!
//! let tracker = Tracker::new(read_position, config).unwrap();
//! let mut updates = tracker.subscribe();
//! tracker.start();
//!
//! updates.wait_for(|state| state.is_connected).await.unwrap();
//! assert_eq!(tracker.state().retry_count, 0);
//! tracker.stop();
//! # });
//! ```
//!
//! ## Cargo features
//!
//! - `serde`: `Serialize`/`Deserialize` for configuration types
//! - `jitter`: randomized backoff delays

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod classify;
pub mod config;
pub mod error;
pub mod fetch;
pub mod policy;
pub mod recorder;
pub mod scheduler;
pub mod state;
pub mod tracker;

// Re-exports
pub use classify::classify;
pub use config::{ConfigError, TrackerConfig};
pub use error::{ErrorCode, FetchError, TrackingError};
pub use fetch::{Fetch, FetchGate, FetchOutcome, FetchTicket};
pub use policy::{JitterStrategy, RetryPolicy};
pub use recorder::{ErrorRecorder, MemoryRecorder, TracingRecorder};
pub use scheduler::{RetryDecision, RetryScheduler, SchedulerState};
pub use state::{ConnectionState, StateStore};
pub use tracker::{Tracker, TrackerBuilder};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::TrackerConfig;
    pub use crate::error::{ErrorCode, FetchError, TrackingError};
    pub use crate::fetch::Fetch;
    pub use crate::policy::RetryPolicy;
    pub use crate::recorder::ErrorRecorder;
    pub use crate::state::ConnectionState;
    pub use crate::tracker::Tracker;
}
